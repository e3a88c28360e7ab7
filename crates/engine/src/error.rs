use retex_traits::PackageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Invalid rule pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Sub-converter '{converter}' failed: {message}")]
    Converter { converter: String, message: String },

    #[error("Malformed markup: {0}")]
    Markup(String),

    #[error("Width arithmetic error: {0}")]
    Width(String),

    #[error("Package registration error: {0}")]
    Package(#[from] PackageError),

    #[error("UTF-8 string error: {0}")]
    Utf8Str(#[from] std::str::Utf8Error),
}

impl RewriteError {
    /// Wraps a failure message with the name of the sub-converter it
    /// came from.
    pub fn converter(name: &str, message: impl std::fmt::Display) -> Self {
        RewriteError::Converter {
            converter: name.to_string(),
            message: message.to_string(),
        }
    }
}
