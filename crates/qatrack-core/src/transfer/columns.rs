//! Fixed column contracts per entity kind.

use std::fmt;

use crate::error::{Result, TrackerError};
use crate::model::EntityKind;

/// A named column of the tabular format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Title,
    Description,
    Status,
    Severity,
    Priority,
    Reporter,
    Assignee,
    Attachments,
    Suite,
    Steps,
    TestData,
    Requirements,
    Created,
}

const ISSUE_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Title,
    Column::Description,
    Column::Status,
    Column::Severity,
    Column::Priority,
    Column::Reporter,
    Column::Assignee,
    Column::Attachments,
    Column::Created,
];

const TEST_CASE_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Title,
    Column::Description,
    Column::Suite,
    Column::Priority,
    Column::Status,
    Column::Steps,
    Column::TestData,
    Column::Requirements,
    Column::Created,
];

const GENERIC_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Title,
    Column::Description,
    Column::Status,
    Column::Priority,
    Column::Assignee,
    Column::Created,
];

impl Column {
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Status => "Status",
            Self::Severity => "Severity",
            Self::Priority => "Priority",
            Self::Reporter => "Reporter",
            Self::Assignee => "Assignee",
            Self::Attachments => "Attachments",
            Self::Suite => "Suite",
            Self::Steps => "Steps",
            Self::TestData => "Test Data",
            Self::Requirements => "Requirements",
            Self::Created => "Created",
        }
    }

    /// Recognise a header cell, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_header(cell: &str) -> Option<Self> {
        let normalized = cell.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "id" | "display id" => Some(Self::Id),
            "title" | "name" => Some(Self::Title),
            "description" => Some(Self::Description),
            "status" => Some(Self::Status),
            "severity" => Some(Self::Severity),
            "priority" => Some(Self::Priority),
            "reporter" | "reported by" => Some(Self::Reporter),
            "assignee" | "assigned to" => Some(Self::Assignee),
            "attachments" => Some(Self::Attachments),
            "suite" | "test suite" => Some(Self::Suite),
            "steps" | "test steps" => Some(Self::Steps),
            "test data" | "data" => Some(Self::TestData),
            "requirements" | "requirement" => Some(Self::Requirements),
            "created" | "created at" => Some(Self::Created),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// The export column order for `kind`.
#[must_use]
pub const fn columns_for(kind: EntityKind) -> &'static [Column] {
    match kind {
        EntityKind::Issue => ISSUE_COLUMNS,
        EntityKind::TestCase => TEST_CASE_COLUMNS,
        _ => GENERIC_COLUMNS,
    }
}

/// Header row for `kind`.
#[must_use]
pub fn headers_for(kind: EntityKind) -> Vec<&'static str> {
    columns_for(kind).iter().map(|c| c.header()).collect()
}

/// Positions of known columns in an imported header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: Vec<(Column, usize)>,
}

impl HeaderMap {
    /// Map a header row onto the column contract of `kind`.
    ///
    /// Columns outside the contract and unknown headers are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the header has no `Title` column.
    pub fn from_headers<'a, I>(kind: EntityKind, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let allowed = columns_for(kind);
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (idx, cell) in headers.into_iter().enumerate() {
            if let Some(column) = Column::from_header(cell) {
                if allowed.contains(&column) && !positions.iter().any(|(c, _)| *c == column) {
                    positions.push((column, idx));
                }
            }
        }
        if !positions.iter().any(|(c, _)| *c == Column::Title) {
            return Err(TrackerError::validation(
                "header",
                format!("missing required column '{}'", Column::Title),
            ));
        }
        Ok(Self { positions })
    }

    /// The trimmed, non-empty cell for `column` in `record`.
    #[must_use]
    pub fn get<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        self.positions
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, idx)| record.get(*idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn contains(&self, column: Column) -> bool {
        self.positions.iter().any(|(c, _)| *c == column)
    }
}
