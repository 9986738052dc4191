use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Pixel spacing in millimeters (row, column)
///
/// Physical distance between the centres of adjacent pixels, as stored in
/// the PixelSpacing attribute of an image slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSpacing {
    pub row: f64,
    pub col: f64,
}

impl PixelSpacing {
    /// Creates a new PixelSpacing
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Parses a spacing pair from text
    ///
    /// The DICOM form is `row\\col`; whitespace, comma and bracketed list
    /// renderings are accepted too, as is exponential notation.
    ///
    /// # Errors
    ///
    /// Returns an error unless at least two numbers are present
    pub fn parse(s: &str) -> Result<Self, String> {
        static NUMBER: OnceLock<Regex> = OnceLock::new();
        let re = NUMBER.get_or_init(|| {
            Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("valid number pattern")
        });

        let values: Vec<f64> = re
            .find_iter(s)
            .take(2)
            .map(|m| {
                m.as_str()
                    .parse::<f64>()
                    .map_err(|e| format!("Invalid spacing value '{}': {}", m.as_str(), e))
            })
            .collect::<Result<_, _>>()?;

        match values.as_slice() {
            [row, col] => Ok(Self::new(*row, *col)),
            _ => Err(format!("Expected two spacing values in '{}'", s)),
        }
    }
}

impl fmt::Display for PixelSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} mm", self.row, self.col)
    }
}
