//! Defines primitives for cell and column widths.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur when combining widths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidthError {
    #[error("Cannot add {left} and {right}: units are incompatible")]
    IncompatibleUnits { left: String, right: String },

    #[error("Cannot add {left} and {right}: absolute and relative widths do not mix")]
    MixedKinds { left: String, right: String },
}

/// A physical length unit as written in markup.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Cm,
    Mm,
    Em,
    Pt,
    Px,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self {
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::Em => "em",
            Unit::Pt => "pt",
            Unit::Px => "px",
        };
        f.write_str(suffix)
    }
}

/// A width as carried through table conversion: either a physical length
/// or a fraction of the surrounding line width.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Width {
    Absolute { value: f32, unit: Unit },
    Relative { fraction: f32 },
}

impl Hash for Width {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Width::Absolute { value, unit } => {
                0u8.hash(state);
                value.to_bits().hash(state);
                unit.hash(state);
            }
            Width::Relative { fraction } => {
                1u8.hash(state);
                fraction.to_bits().hash(state);
            }
        }
    }
}

impl Eq for Width {}

impl Width {
    pub fn absolute(value: f32, unit: Unit) -> Self {
        Width::Absolute { value, unit }
    }

    pub fn relative(fraction: f32) -> Self {
        Width::Relative { fraction }
    }

    /// Adds two widths, harmonizing `cm` and `mm` to `mm`. Any other unit
    /// mismatch, or mixing absolute and relative widths, is an error.
    pub fn checked_add(&self, rhs: &Width) -> Result<Width, WidthError> {
        match (self, rhs) {
            (Width::Relative { fraction: a }, Width::Relative { fraction: b }) => {
                Ok(Width::Relative { fraction: a + b })
            }
            (Width::Absolute { value: a, unit: ua }, Width::Absolute { value: b, unit: ub }) => {
                match (ua, ub) {
                    _ if ua == ub => Ok(Width::Absolute {
                        value: a + b,
                        unit: ua.clone(),
                    }),
                    (Unit::Cm, Unit::Mm) => Ok(Width::Absolute {
                        value: a * 10.0 + b,
                        unit: Unit::Mm,
                    }),
                    (Unit::Mm, Unit::Cm) => Ok(Width::Absolute {
                        value: a + b * 10.0,
                        unit: Unit::Mm,
                    }),
                    _ => Err(WidthError::IncompatibleUnits {
                        left: self.to_string(),
                        right: rhs.to_string(),
                    }),
                }
            }
            _ => Err(WidthError::MixedKinds {
                left: self.to_string(),
                right: rhs.to_string(),
            }),
        }
    }
}

/// Formats a length value with up to two decimal places, without a
/// trailing ".0" on whole numbers.
fn format_value(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

impl fmt::Display for Width {
    /// Renders the width as a LaTeX length. `px` has no LaTeX equivalent
    /// and is emitted as `pt` (1px = 0.75pt).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Absolute {
                value,
                unit: Unit::Px,
            } => write!(f, "{}pt", format_value(value * 0.75)),
            Width::Absolute { value, unit } => write!(f, "{}{}", format_value(*value), unit),
            Width::Relative { fraction } => write!(f, "{:.2}\\linewidth", fraction),
        }
    }
}
