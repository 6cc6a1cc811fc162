//! The mini-grammars used for steps and test data inside a single cell.
//!
//! ```text
//! 1. Open the login page | Expected: Form is shown
//! 2. Submit empty form
//! 1. username (string): alice
//! 2. retries: 3
//! ```
//!
//! Parsing tries a fixed, ordered list of line shapes; the first one that
//! matches a line wins. A `|` inside step text is written as `\|`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Result, TrackerError};
use crate::model::{DataItem, Step};
use crate::util::LINE_JOIN;

const ESCAPED_PIPE: &str = "\\|";
/// Stands in for an escaped pipe while the step shapes are matched.
const PIPE_PLACEHOLDER: char = '\u{1}';

// Hard-coded patterns; a failure to compile is a programming error caught by tests.
static STEP_WITH_EXPECTED: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"(?i)^\s*(\d+)\.\s+(.+?)\s*\|\s*expected:\s*(.*?)\s*$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static STEP_WITH_RESULT: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"^\s*(\d+)\.\s+(.+?)\s*\|\s*(.+?)\s*$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static STEP_BARE: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^\s*(\d+)\.\s+(.+?)\s*$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static DATA_TYPED: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"^\s*(\d+)\.\s+(.+?)\s*\(([^()]*)\)\s*:\s*(.*?)\s*$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static DATA_VALUE: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^\s*(\d+)\.\s+([^:]+?)\s*:\s*(.*?)\s*$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static DATA_NAME: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^\s*(\d+)\.\s+([^:]+?)\s*$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static ENUMERATED: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^\d+\.\s") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});

/// One shape a line may take, tried in order.
pub struct Attempt<T> {
    pub name: &'static str,
    pub parse: fn(&str) -> Option<T>,
}

/// Step shapes, most specific first.
pub const STEP_ATTEMPTS: &[Attempt<Step>] = &[
    Attempt {
        name: "description | Expected: result",
        parse: step_with_expected,
    },
    Attempt {
        name: "description | result",
        parse: step_with_result,
    },
    Attempt {
        name: "description",
        parse: step_bare,
    },
];

/// Data item shapes, most specific first.
pub const DATA_ATTEMPTS: &[Attempt<DataItem>] = &[
    Attempt {
        name: "name (type): value",
        parse: data_typed,
    },
    Attempt {
        name: "name: value",
        parse: data_value,
    },
    Attempt {
        name: "name",
        parse: data_name,
    },
];

fn text(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i).map_or_else(String::new, |m| m.as_str().trim().to_string())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn step_with_expected(line: &str) -> Option<Step> {
    STEP_WITH_EXPECTED.captures(line).map(|caps| Step {
        description: text(&caps, 2),
        expected: non_empty(text(&caps, 3)),
    })
}

fn step_with_result(line: &str) -> Option<Step> {
    STEP_WITH_RESULT.captures(line).map(|caps| Step {
        description: text(&caps, 2),
        expected: non_empty(text(&caps, 3)),
    })
}

fn step_bare(line: &str) -> Option<Step> {
    STEP_BARE.captures(line).map(|caps| Step {
        description: text(&caps, 2),
        expected: None,
    })
}

fn data_typed(line: &str) -> Option<DataItem> {
    DATA_TYPED.captures(line).map(|caps| DataItem {
        name: text(&caps, 2),
        data_type: non_empty(text(&caps, 3)),
        value: text(&caps, 4),
    })
}

fn data_value(line: &str) -> Option<DataItem> {
    DATA_VALUE.captures(line).map(|caps| DataItem {
        name: text(&caps, 2),
        data_type: None,
        value: text(&caps, 3),
    })
}

fn data_name(line: &str) -> Option<DataItem> {
    DATA_NAME.captures(line).map(|caps| DataItem {
        name: text(&caps, 2),
        data_type: None,
        value: String::new(),
    })
}

/// Run `attempts` against `line` and return the first success.
#[must_use]
pub fn first_match<T>(attempts: &[Attempt<T>], line: &str) -> Option<T> {
    attempts.iter().find_map(|attempt| (attempt.parse)(line))
}

// ============================================================================
// Rendering
// ============================================================================

#[must_use]
pub fn render_steps(steps: &[Step]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let description = escape_pipes(&step.description);
            match &step.expected {
                Some(expected) => format!("{}. {} | Expected: {}", i + 1, description, escape_pipes(expected)),
                None => format!("{}. {}", i + 1, description),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_pipes(text: &str) -> String {
    text.replace('|', ESCAPED_PIPE)
}

fn restore_pipes(text: String) -> String {
    if text.contains(PIPE_PLACEHOLDER) {
        text.replace(PIPE_PLACEHOLDER, "|")
    } else {
        text
    }
}

#[must_use]
pub fn render_data(items: &[DataItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match &item.data_type {
            Some(data_type) => format!("{}. {} ({}): {}", i + 1, item.name, data_type, item.value),
            None => format!("{}. {}: {}", i + 1, item.name, item.value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Parsing
// ============================================================================

/// Split a cell into enumerated lines.
///
/// Cells flattened onto one line with `" | "` are re-split: a segment that
/// starts with `N. ` opens a new line, anything else continues the previous
/// one.
#[must_use]
pub fn split_lines(cell: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in cell.lines() {
        let mut segments = raw.split(LINE_JOIN).map(str::trim).filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            continue;
        };
        let mut current = first.to_string();
        for segment in segments {
            if ENUMERATED.is_match(segment) {
                lines.push(std::mem::replace(&mut current, segment.to_string()));
            } else {
                current.push_str(LINE_JOIN);
                current.push_str(segment);
            }
        }
        lines.push(current);
    }
    lines
}

/// Parse a steps cell.
///
/// # Errors
///
/// Returns `Validation` on the `steps` field naming the first line that no
/// attempt accepts.
pub fn parse_steps(cell: &str) -> Result<Vec<Step>> {
    let protected = cell.replace(ESCAPED_PIPE, &PIPE_PLACEHOLDER.to_string());
    let steps = parse_with(&protected, STEP_ATTEMPTS, "steps")
        .map_err(|err| match err {
            TrackerError::Validation { field, reason } => TrackerError::Validation {
                field,
                reason: restore_pipes(reason),
            },
            other => other,
        })?;
    Ok(steps
        .into_iter()
        .map(|step| Step {
            description: restore_pipes(step.description),
            expected: step.expected.map(restore_pipes),
        })
        .collect())
}

/// Parse a test data cell.
///
/// # Errors
///
/// Returns `Validation` on the `testData` field naming the first line that no
/// attempt accepts.
pub fn parse_data(cell: &str) -> Result<Vec<DataItem>> {
    parse_with(cell, DATA_ATTEMPTS, "testData")
}

fn parse_with<T>(cell: &str, attempts: &[Attempt<T>], field: &str) -> Result<Vec<T>> {
    split_lines(cell)
        .iter()
        .enumerate()
        .map(|(i, line)| {
            first_match(attempts, line).ok_or_else(|| {
                TrackerError::validation(field, format!("line {}: cannot parse '{}'", i + 1, line))
            })
        })
        .collect()
}
