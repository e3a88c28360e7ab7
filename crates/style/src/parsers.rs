//! Low-level nom parser functions for width and alignment attribute values.
//!
//! This module provides composable parser functions for the CSS-like values
//! that appear in `width=` attributes and inline `style=` declarations.

use crate::align::HAlign;
use crate::width::{Unit, Width};
use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{map, map_res, opt, recognize};
use nom::sequence::pair;
use thiserror::Error;

/// Errors that can occur during attribute value parsing.
#[derive(Error, Debug, Clone)]
pub enum StyleParseError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value for '{property}': {value}")]
    InvalidValue { property: String, value: String },
}

// --- Helper Parsers ---

fn parse_f32(input: &str) -> IResult<&str, f32> {
    map_res(
        recognize(pair(
            opt(alt((char('+'), char('-')))),
            alt((
                recognize((
                    take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                    opt((
                        char('.'),
                        take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                    )),
                )),
                recognize((
                    char('.'),
                    take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                )),
            )),
        )),
        |s: &str| s.parse::<f32>(),
    )
    .parse(input)
}

// --- Unit & Width Parsers ---

fn parse_unit(input: &str) -> IResult<&str, Unit> {
    alt((
        map(tag_no_case("cm"), |_| Unit::Cm),
        map(tag_no_case("mm"), |_| Unit::Mm),
        map(tag_no_case("em"), |_| Unit::Em),
        map(tag_no_case("pt"), |_| Unit::Pt),
        map(tag_no_case("px"), |_| Unit::Px),
    ))
    .parse(input)
}

/// Parses a width value: a percentage, a length with a unit, or a bare
/// number (which HTML treats as pixels).
pub fn parse_width(input: &str) -> IResult<&str, Width> {
    alt((
        map(pair(parse_f32, char('%')), |(value, _)| Width::Relative {
            fraction: value / 100.0,
        }),
        map(pair(parse_f32, parse_unit), |(value, unit)| {
            Width::Absolute { value, unit }
        }),
        map(parse_f32, |value| Width::Absolute {
            value,
            unit: Unit::Px,
        }),
    ))
    .parse(input)
}

/// Helper to run a nom parser and convert its result to a `Result<T, StyleParseError>`.
pub fn run_parser<'a, T, F>(parser: F, input: &'a str) -> Result<T, StyleParseError>
where
    F: Fn(&'a str) -> IResult<&'a str, T>,
{
    match parser(input.trim()) {
        Ok(("", result)) => Ok(result),
        Ok((rem, _)) => Err(StyleParseError::Parse(format!(
            "Parser did not consume all input. Remainder: '{}'",
            rem
        ))),
        Err(e) => Err(StyleParseError::Parse(e.to_string())),
    }
}

// --- High-level Parse Functions ---

/// Parses a horizontal alignment keyword as found in `align=` attributes
/// and `text-align` declarations.
pub fn parse_halign(s: &str) -> Result<HAlign, StyleParseError> {
    match s.to_lowercase().as_str() {
        "left" => Ok(HAlign::Left),
        "right" => Ok(HAlign::Right),
        "center" | "middle" => Ok(HAlign::Center),
        "justify" => Ok(HAlign::Justify),
        _ => Err(StyleParseError::InvalidValue {
            property: "align".to_string(),
            value: s.to_string(),
        }),
    }
}

/// Extracts a single property value from an inline `style="key: value; ..."`
/// attribute. Later declarations win, as in CSS.
pub fn css_property<'a>(css: &'a str, name: &str) -> Option<&'a str> {
    let mut found = None;
    for declaration in css.split(';') {
        if let Some((key, value)) = declaration.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                found = Some(value.trim());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_width_with_unit() {
        assert_eq!(
            run_parser(parse_width, "10cm").unwrap(),
            Width::Absolute {
                value: 10.0,
                unit: Unit::Cm
            }
        );
        assert_eq!(
            run_parser(parse_width, " 2.5mm ").unwrap(),
            Width::Absolute {
                value: 2.5,
                unit: Unit::Mm
            }
        );
        assert_eq!(
            run_parser(parse_width, "12PT").unwrap(),
            Width::Absolute {
                value: 12.0,
                unit: Unit::Pt
            }
        );
    }

    #[test]
    fn test_parse_width_percentage() {
        assert_eq!(
            run_parser(parse_width, "30%").unwrap(),
            Width::Relative { fraction: 0.3 }
        );
    }

    #[test]
    fn test_parse_width_bare_number_is_pixels() {
        assert_eq!(
            run_parser(parse_width, "300").unwrap(),
            Width::Absolute {
                value: 300.0,
                unit: Unit::Px
            }
        );
    }

    #[test]
    fn test_parse_width_rejects_garbage() {
        assert!(run_parser(parse_width, "abc").is_err());
        assert!(run_parser(parse_width, "10c").is_err());
        assert!(run_parser(parse_width, "").is_err());
    }

    #[test]
    fn test_parse_halign() {
        assert_eq!(parse_halign("center").unwrap(), HAlign::Center);
        assert_eq!(parse_halign("RIGHT").unwrap(), HAlign::Right);
        assert!(parse_halign("sideways").is_err());
    }

    #[test]
    fn test_css_property() {
        let css = "width: 10cm; text-align:center";
        assert_eq!(css_property(css, "width"), Some("10cm"));
        assert_eq!(css_property(css, "text-align"), Some("center"));
        assert_eq!(css_property(css, "height"), None);
        // Later declarations win.
        assert_eq!(css_property("width: 1cm; width: 2cm", "width"), Some("2cm"));
    }
}
