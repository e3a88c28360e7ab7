//! ContextProvider trait for abstracting the document being converted.
//!
//! This trait lets converters resolve relative hyperlinks and look up
//! document metadata without being tied to any particular CMS or
//! document store.

use std::collections::HashMap;
use std::fmt::Debug;

/// A trait for answering questions about the document a fragment of
/// markup belongs to.
///
/// # Implementations
///
/// - `StaticContext`: a fixed base URL and metadata map (always available)
///
/// # Example
///
/// ```ignore
/// let context = StaticContext::new()
///     .with_base_url("https://example.org/docs/")
///     .with_field("title", "User guide");
/// assert_eq!(context.resolve_url("intro.html"), "https://example.org/docs/intro.html");
/// ```
pub trait ContextProvider: Send + Sync + Debug {
    /// Resolve a possibly relative URL against the document's location.
    ///
    /// Absolute URLs and fragment-only references must be returned
    /// unchanged.
    fn resolve_url(&self, href: &str) -> String;

    /// Look up a metadata field of the surrounding document (title,
    /// author, and so on). Returns `None` for unknown fields.
    fn field(&self, name: &str) -> Option<String>;

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Returns `true` when `href` carries a URL scheme (`https:`, `mailto:`, ...).
fn has_scheme(href: &str) -> bool {
    match href.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// A context provider backed by a fixed base URL and metadata map.
///
/// With no base URL configured, relative links are passed through
/// unchanged.
#[derive(Debug, Default)]
pub struct StaticContext {
    base_url: Option<String>,
    fields: HashMap<String, String>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl ContextProvider for StaticContext {
    fn resolve_url(&self, href: &str) -> String {
        if has_scheme(href) || href.starts_with('#') {
            return href.to_string();
        }
        let Some(base) = &self.base_url else {
            return href.to_string();
        };
        if let Some(rooted) = href.strip_prefix('/') {
            // Site-absolute path: join against the origin of the base URL.
            let origin_end = base
                .find("://")
                .and_then(|at| base[at + 3..].find('/').map(|slash| at + 3 + slash))
                .unwrap_or(base.len());
            return format!("{}/{}", &base[..origin_end], rooted);
        }
        format!("{}/{}", base.trim_end_matches('/'), href)
    }

    fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn name(&self) -> &'static str {
        "StaticContext"
    }
}
