pub mod align;
pub mod parsers;
pub mod width;

pub use align::HAlign;
pub use parsers::StyleParseError;
pub use width::{Unit, Width, WidthError};
