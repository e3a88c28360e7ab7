//! HTML-to-LaTeX sub-converters and the default rule table.
//!
//! The engine crate supplies the rewrite machinery; this crate supplies
//! the conversions. [`default_rules`] assembles the full pipeline, and
//! the individual converters are exported for callers that compose
//! their own rule tables.

mod defaults;
mod dom;
mod error;
mod inline;
mod list;
mod table;

pub use defaults::default_rules;
pub use error::ConvertError;
pub use inline::{
    BareUrlConverter, EntityConverter, EscapeConverter, FootnoteConverter, HyperlinkConverter,
    NewlineFixupConverter, PreConverter, StrikeoutConverter,
};
pub use list::ListConverter;
pub use table::TableConverter;
