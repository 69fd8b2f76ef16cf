//! Secret tap pattern and quadrant codes.
//!
//! Pure domain logic - no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Screen quadrant a tap landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Classify a touch at `(x, y)` on a `width` x `height` surface.
    ///
    /// Points exactly on a midline belong to the right / bottom half.
    pub fn from_touch(x: f32, y: f32, width: f32, height: f32) -> Self {
        let column = if x < width / 2.0 { 0 } else { 1 };
        let row = if y < height / 2.0 { 0 } else { 1 };
        match row * 2 + column {
            0 => Quadrant::TopLeft,
            1 => Quadrant::TopRight,
            2 => Quadrant::BottomLeft,
            _ => Quadrant::BottomRight,
        }
    }
}

/// Rejected pattern input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must contain at least one tap")]
    Empty,
    #[error("invalid quadrant code {0} (expected 0-3)")]
    InvalidCode(i64),
}

/// Ordered sequence of quadrants that unlocks the cover.
///
/// Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct SecretPattern(Vec<Quadrant>);

impl Default for SecretPattern {
    fn default() -> Self {
        Self(Quadrant::ALL.to_vec())
    }
}

impl SecretPattern {
    pub fn new(quadrants: Vec<Quadrant>) -> Result<Self, PatternError> {
        if quadrants.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self(quadrants))
    }

    /// Build from user-supplied integer codes, validating each one.
    pub fn from_codes<I>(codes: I) -> Result<Self, PatternError>
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        let quadrants = codes
            .into_iter()
            .map(|code| {
                let code = code.into();
                u8::try_from(code)
                    .ok()
                    .and_then(Quadrant::from_code)
                    .ok_or(PatternError::InvalidCode(code))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(quadrants)
    }

    /// Decode the persisted comma-delimited form.
    ///
    /// Empty or malformed input yields the default pattern; never an error.
    pub fn decode(stored: &str) -> Self {
        let stored = stored.trim();
        if stored.is_empty() {
            return Self::default();
        }

        let codes: Result<Vec<i64>, _> = stored
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect();

        match codes.map_err(|_| ()).and_then(|c| Self::from_codes(c).map_err(|_| ())) {
            Ok(pattern) => pattern,
            Err(()) => {
                tracing::warn!(stored, "malformed secret pattern, using default");
                Self::default()
            }
        }
    }

    /// Encode as a comma-delimited list, e.g. `"0,1,2,3"`.
    pub fn encode(&self) -> String {
        self.codes()
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn codes(&self) -> Vec<u8> {
        self.0.iter().map(|q| q.code()).collect()
    }

    pub fn quadrants(&self) -> &[Quadrant] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `codes` equals the pattern element-for-element.
    pub fn matches<'a>(&self, codes: impl ExactSizeIterator<Item = &'a u8>) -> bool {
        codes.len() == self.0.len() && codes.zip(&self.0).all(|(&c, q)| c == q.code())
    }
}

impl TryFrom<Vec<u8>> for SecretPattern {
    type Error = PatternError;

    fn try_from(codes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_codes(codes)
    }
}

impl From<SecretPattern> for Vec<u8> {
    fn from(pattern: SecretPattern) -> Self {
        pattern.codes()
    }
}

impl fmt::Display for SecretPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.encode())
    }
}
