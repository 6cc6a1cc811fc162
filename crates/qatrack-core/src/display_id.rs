//! Human-facing display IDs derived from sequential custom IDs.
//!
//! A pattern such as `REQ-{customId}` maps custom ID `7` to `REQ-7`, and the
//! inverse maps `REQ-7` (or `req-7`) back to `7`. Kinds without a stored
//! pattern fall back to the bare integer in both directions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::model::EntityKind;

/// Token substituted by the custom ID.
pub const PLACEHOLDER: &str = "{customId}";

/// The stored display pattern for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIdFormat {
    pub kind: EntityKind,
    pattern: String,
}

impl DisplayIdFormat {
    /// Build a format, rejecting patterns without exactly one placeholder.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the placeholder is missing or repeated.
    pub fn new(kind: EntityKind, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        validate_pattern(&pattern)?;
        Ok(Self { kind, pattern })
    }

    /// The default format seeded for a kind.
    #[must_use]
    pub fn default_for(kind: EntityKind) -> Self {
        Self {
            kind,
            pattern: kind.default_pattern().to_string(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn format(&self, value: u64) -> String {
        format(&self.pattern, value)
    }

    /// # Errors
    ///
    /// Returns `FormatMismatch` if `display` was not produced by this pattern.
    pub fn parse(&self, display: &str) -> Result<u64> {
        parse(&self.pattern, display)
    }
}

/// Check that `pattern` contains the placeholder exactly once.
///
/// # Errors
///
/// Returns `InvalidPattern` describing the problem.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    match pattern.matches(PLACEHOLDER).count() {
        1 => Ok(()),
        0 => Err(TrackerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("missing {PLACEHOLDER}"),
        }),
        n => Err(TrackerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("{PLACEHOLDER} appears {n} times"),
        }),
    }
}

/// Substitute `value` into the pattern's placeholder.
#[must_use]
pub fn format(pattern: &str, value: u64) -> String {
    pattern.replacen(PLACEHOLDER, &value.to_string(), 1)
}

/// Recover the custom ID from a display string.
///
/// Literal text around the placeholder is matched case-insensitively and
/// surrounding whitespace is ignored. The remainder must be plain digits.
///
/// # Errors
///
/// Returns `InvalidPattern` for a malformed pattern and `FormatMismatch` when
/// the literals differ or the remainder is not a valid unsigned integer.
pub fn parse(pattern: &str, display: &str) -> Result<u64> {
    validate_pattern(pattern)?;
    let (prefix, suffix) = pattern.split_once(PLACEHOLDER).unwrap_or((pattern, ""));
    let prefix = prefix.trim_start();
    let suffix = suffix.trim_end();
    let input = display.trim();

    let mismatch = || TrackerError::FormatMismatch {
        pattern: pattern.to_string(),
        input: display.to_string(),
    };

    if input.len() < prefix.len() + suffix.len() {
        return Err(mismatch());
    }
    let head = input.get(..prefix.len()).ok_or_else(mismatch)?;
    let tail = input
        .get(input.len() - suffix.len()..)
        .ok_or_else(mismatch)?;
    if !head.eq_ignore_ascii_case(prefix) || !tail.eq_ignore_ascii_case(suffix) {
        return Err(mismatch());
    }

    let digits = &input[prefix.len()..input.len() - suffix.len()];
    parse_digits(digits).ok_or_else(mismatch)
}

/// Parse a bare custom ID (used when no pattern is stored).
///
/// # Errors
///
/// Returns `FormatMismatch` against the bare placeholder.
pub fn parse_bare(display: &str) -> Result<u64> {
    parse_digits(display.trim()).ok_or_else(|| TrackerError::FormatMismatch {
        pattern: PLACEHOLDER.to_string(),
        input: display.to_string(),
    })
}

fn parse_digits(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Split a reference list such as `"REQ1, REQ2; REQ9"` into its items.
#[must_use]
pub fn split_references(input: &str) -> Vec<&str> {
    input
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Display formats for every kind, loaded once per operation.
#[derive(Debug, Clone, Default)]
pub struct DisplayIds {
    formats: HashMap<EntityKind, DisplayIdFormat>,
}

impl DisplayIds {
    #[must_use]
    pub fn new(formats: impl IntoIterator<Item = DisplayIdFormat>) -> Self {
        Self {
            formats: formats.into_iter().map(|f| (f.kind, f)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<&DisplayIdFormat> {
        self.formats.get(&kind)
    }

    /// Format a custom ID, degrading to the bare integer without a pattern.
    #[must_use]
    pub fn format(&self, kind: EntityKind, value: u64) -> String {
        self.get(kind)
            .map_or_else(|| value.to_string(), |f| f.format(value))
    }

    /// Inverse of [`DisplayIds::format`].
    ///
    /// # Errors
    ///
    /// Returns `FormatMismatch` if the string does not match the kind's pattern.
    pub fn parse(&self, kind: EntityKind, display: &str) -> Result<u64> {
        match self.get(kind) {
            Some(format) => format.parse(display),
            None => parse_bare(display),
        }
    }

    /// Parse every item of a reference list, keeping failures alongside.
    #[must_use]
    pub fn parse_list<'a>(&self, kind: EntityKind, input: &'a str) -> Vec<(&'a str, Result<u64>)> {
        split_references(input)
            .into_iter()
            .map(|item| (item, self.parse(kind, item)))
            .collect()
    }
}
