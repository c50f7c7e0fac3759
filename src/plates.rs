//! Licence plates
//!
//! Plates are the primary key for everything the ledger tracks. They are
//! stored normalized: surrounding whitespace trimmed and letters uppercased,
//! so `" abc123 "` and `"ABC123"` are the same vehicle.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a [`Plate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlateError {
    /// The plate was empty (or whitespace only).
    #[error("plate must not be empty")]
    Empty,

    /// The plate was outside the accepted length range.
    #[error("plate must be between 3 and 8 characters, got {0}")]
    Length(usize),

    /// The plate contained characters other than letters, digits, dashes and spaces.
    #[error("plate may only contain letters, digits, dashes and spaces")]
    Charset,

    /// The plate lacked a letter or a digit.
    #[error("plate must contain at least one letter and one digit")]
    Composition,
}

/// A normalized licence plate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plate(String);

impl Plate {
    /// Normalizes `raw` (trim + uppercase) and rejects empty input.
    ///
    /// This is the only check the ledger itself performs; stricter format
    /// rules are opt-in via [`Plate::parse_strict`].
    ///
    /// # Errors
    ///
    /// Returns [`PlateError::Empty`] if nothing remains after trimming.
    pub fn new(raw: &str) -> Result<Self, PlateError> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(PlateError::Empty);
        }

        Ok(Self(normalized))
    }

    /// Normalizes `raw` and validates the plate format: 3 to 8 characters,
    /// letters/digits/dashes/spaces only, at least one letter and one digit.
    ///
    /// Subscription registration uses this, and front-end adapters taking
    /// free-form input can too; entries and records restored from a snapshot
    /// are accepted as-is through [`Plate::new`].
    ///
    /// # Errors
    ///
    /// Returns a [`PlateError`] describing the first failed rule.
    pub fn parse_strict(raw: &str) -> Result<Self, PlateError> {
        let plate = Self::new(raw)?;

        let len = plate.0.chars().count();
        if !(3..=8).contains(&len) {
            return Err(PlateError::Length(len));
        }

        let compact: String = plate
            .0
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .collect();

        if !compact.chars().all(char::is_alphanumeric) {
            return Err(PlateError::Charset);
        }

        let has_letter = compact.chars().any(char::is_alphabetic);
        let has_digit = compact.chars().any(|c| c.is_ascii_digit());

        if !has_letter || !has_digit {
            return Err(PlateError::Composition);
        }

        Ok(plate)
    }

    /// The normalized plate text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Plate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
