use retex_engine::RewriteError;
use retex_style::WidthError;
use retex_traits::PackageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("Width arithmetic error: {0}")]
    Width(#[from] WidthError),

    #[error("Package registration error: {0}")]
    Package(#[from] PackageError),

    #[error("Markup structure error: {0}")]
    Structure(String),
}

impl ConvertError {
    pub fn structure(message: impl Into<String>) -> Self {
        ConvertError::Structure(message.into())
    }
}

impl From<retex_style::StyleParseError> for ConvertError {
    fn from(e: retex_style::StyleParseError) -> Self {
        ConvertError::Structure(e.to_string())
    }
}

impl From<ConvertError> for RewriteError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::XmlParse(e) => RewriteError::Markup(e.to_string()),
            ConvertError::Width(e) => RewriteError::Width(e.to_string()),
            ConvertError::Package(e) => RewriteError::Package(e),
            ConvertError::Structure(s) => RewriteError::Markup(s),
        }
    }
}
