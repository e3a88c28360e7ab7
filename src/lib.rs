//! HTML-to-LaTeX conversion built on an ordered rewrite pipeline.
//!
//! The engine applies literal, regex, and dispatch rules to a text
//! buffer in a fixed order; sub-converters handle the structured markup
//! (tables, lists, links) and lock their output so later rules cannot
//! disturb it. The default rule table covers the common HTML fragment
//! vocabulary and can be extended or overridden per converter and per
//! call.
//!
//! ```
//! let conversion = retex::convert("<p>Hello <b>world</b></p>")?;
//! assert_eq!(conversion.latex, "Hello \\textbf{world}");
//! # Ok::<(), retex::RewriteError>(())
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

pub use retex_convert::{
    BareUrlConverter, ConvertError, EntityConverter, EscapeConverter, FootnoteConverter,
    HyperlinkConverter, ListConverter, NewlineFixupConverter, PreConverter, StrikeoutConverter,
    TableConverter, default_rules,
};
pub use retex_engine::{
    Invocation, Placeholder, RewriteError, Rewriter, Rule, RuleSet, RunOptions, SubConverter,
};
pub use retex_style::{HAlign, Unit, Width};
pub use retex_traits::{
    ArtifactStore, ContextProvider, Package, PackageRegistry, Services, StaticContext,
};

/// Converts one HTML fragment with the default rule table and an empty
/// context.
pub fn convert(html: &str) -> Result<Conversion, RewriteError> {
    Converter::new()?.convert(html)
}

/// The result of one conversion: the LaTeX body plus everything the
/// sub-converters requested along the way.
#[derive(Debug)]
pub struct Conversion {
    pub latex: String,
    /// Packages the output depends on, in a use-safe order.
    pub packages: Vec<Package>,
    /// Auxiliary files emitted during conversion, by file name.
    pub files: BTreeMap<String, Vec<u8>>,
}

impl Conversion {
    /// The `\usepackage` lines for [`Conversion::packages`].
    pub fn preamble(&self) -> String {
        self.packages
            .iter()
            .map(Package::to_latex)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A reusable HTML-to-LaTeX converter.
///
/// Holds a rule table, a context provider, and run options; each
/// [`Converter::convert`] call gets a fresh package registry and
/// artifact store, so one converter can serve many documents.
pub struct Converter {
    rules: RuleSet,
    context: Arc<dyn ContextProvider>,
    options: RunOptions,
}

impl Converter {
    /// A converter with the default rule table and an empty context.
    pub fn new() -> Result<Self, RewriteError> {
        Ok(Self::builder()?.build())
    }

    /// Starts a builder seeded with the default rule table.
    pub fn builder() -> Result<ConverterBuilder, RewriteError> {
        Ok(ConverterBuilder {
            rules: default_rules()?,
            context: Arc::new(StaticContext::new()),
            options: RunOptions::default(),
        })
    }

    /// The rule table this converter runs.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Converts one HTML fragment.
    pub fn convert(&self, html: &str) -> Result<Conversion, RewriteError> {
        self.convert_rules(&self.rules, html)
    }

    /// Converts raw bytes; the input must be UTF-8.
    pub fn convert_bytes(&self, html: &[u8]) -> Result<Conversion, RewriteError> {
        self.convert(std::str::from_utf8(html)?)
    }

    /// Converts with extra rules merged into the table for this call
    /// only. Rules whose search key matches an existing rule replace it
    /// in place; new rules append to the requested segment.
    pub fn convert_with(
        &self,
        html: &str,
        rules: impl IntoIterator<Item = (Placeholder, Rule)>,
    ) -> Result<Conversion, RewriteError> {
        let mut merged = self.rules.clone();
        merged.extend(rules);
        self.convert_rules(&merged, html)
    }

    fn convert_rules(&self, rules: &RuleSet, html: &str) -> Result<Conversion, RewriteError> {
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let latex = {
            let mut services = Services {
                context: self.context.as_ref(),
                packages: &mut packages,
                files: &mut files,
            };
            Rewriter::with_options(rules, self.options).run(html, &mut services)?
        };
        Ok(Conversion {
            latex,
            packages: packages.resolve(),
            files: files.into_inner(),
        })
    }
}

/// Configures a [`Converter`].
pub struct ConverterBuilder {
    rules: RuleSet,
    context: Arc<dyn ContextProvider>,
    options: RunOptions,
}

impl ConverterBuilder {
    /// Sets the context provider used to resolve links and metadata.
    pub fn context(mut self, context: impl ContextProvider + 'static) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Inserts or replaces one rule.
    pub fn rule(mut self, at: Placeholder, rule: Rule) -> Self {
        self.rules.insert(at, rule);
        self
    }

    /// Inserts or replaces a dispatch rule that hands matches of
    /// `pattern` to `handler`.
    pub fn handler(
        self,
        at: Placeholder,
        pattern: &str,
        handler: impl SubConverter + 'static,
    ) -> Result<Self, RewriteError> {
        Ok(self.rule(at, Rule::dispatch(pattern, Arc::new(handler))?))
    }

    /// Keeps leading and trailing whitespace of the input instead of
    /// trimming it before the pipeline runs.
    pub fn keep_surrounding_whitespace(mut self) -> Self {
        self.options.trim = false;
        self
    }

    pub fn build(self) -> Converter {
        Converter {
            rules: self.rules,
            context: self.context,
            options: self.options,
        }
    }
}
