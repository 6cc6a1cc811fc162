//! Error types for `qatrack-core`.
//!
//! Every variant maps to a stable error code so callers can show a generic
//! message for store failures while still logging something actionable.

use thiserror::Error;

/// Primary error type for qatrack operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple validation errors occurred.
    #[error("Validation errors: {errors:?}")]
    ValidationErrors { errors: Vec<ValidationError> },

    /// Invalid status value.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    /// Invalid severity value.
    #[error("Invalid severity: {severity}")]
    InvalidSeverity { severity: String },

    /// Invalid priority value.
    #[error("Invalid priority: {priority}")]
    InvalidPriority { priority: String },

    /// Unknown caller role.
    #[error("Invalid role: {role}")]
    InvalidRole { role: String },

    /// Unknown entity kind.
    #[error("Invalid entity kind: {kind}")]
    InvalidKind { kind: String },

    // === Display ID Errors ===
    /// Display ID does not match the pattern for its entity kind.
    #[error("Display ID '{input}' does not match pattern '{pattern}'")]
    FormatMismatch { pattern: String, input: String },

    /// Pattern is missing the placeholder or repeats it.
    #[error("Invalid display ID pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Entity Errors ===
    /// Entity was not found.
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: String, id: String },

    /// A custom ID was issued twice for the same kind and project.
    #[error("Duplicate custom ID {custom_id} for {kind} in project {project_id}")]
    DuplicateCustomId {
        kind: String,
        project_id: String,
        custom_id: u64,
    },

    // === Import Errors ===
    /// A single imported row could not be materialised.
    #[error("Row {row}: {reason}")]
    RowImport { row: usize, reason: String },

    // === Counter Errors ===
    /// The sequence reached its maximum value.
    #[error("Sequence exhausted for {kind} (scope: {scope})")]
    SequenceExhausted { kind: String, scope: String },

    // === Storage Errors ===
    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected an operation for a non-transient reason.
    #[error("Storage error: {0}")]
    Storage(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl TrackerError {
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(reason.to_string())
    }

    #[must_use]
    pub fn from_validation_errors(errors: Vec<ValidationError>) -> Self {
        if errors.len() == 1 {
            let err = &errors[0];
            Self::Validation {
                field: err.field.clone(),
                reason: err.message.clone(),
            }
        } else {
            Self::ValidationErrors { errors }
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. }
            | Self::ValidationErrors { .. }
            | Self::InvalidStatus { .. }
            | Self::InvalidSeverity { .. }
            | Self::InvalidPriority { .. }
            | Self::InvalidRole { .. }
            | Self::InvalidKind { .. } => "E_VALIDATION",
            Self::FormatMismatch { .. } => "E_FORMAT_MISMATCH",
            Self::InvalidPattern { .. } => "E_INVALID_PATTERN",
            Self::EntityNotFound { .. } => "E_NOT_FOUND",
            Self::DuplicateCustomId { .. } => "E_DUPLICATE_CUSTOM_ID",
            Self::RowImport { .. } => "E_ROW_IMPORT",
            Self::SequenceExhausted { .. } => "E_SEQUENCE_EXHAUSTED",
            Self::StoreUnavailable(_) => "E_STORE_UNAVAILABLE",
            Self::Storage(_) => "E_STORAGE",
            Self::Io(_) => "E_IO",
            Self::Json(_) => "E_JSON",
            Self::Csv(_) => "E_CSV",
        }
    }

    /// True when the caller may retry the whole operation later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Message suitable for end users.
    ///
    /// Caller mistakes are shown verbatim so they can be corrected; store
    /// and internal failures collapse to a generic message plus the code.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::StoreUnavailable(_) | Self::Storage(_) | Self::Io(_) | Self::Json(_) => {
                format!("Something went wrong, please try again ({})", self.code())
            }
            Self::SequenceExhausted { .. } => {
                format!("No more identifiers can be issued ({})", self.code())
            }
            other => other.to_string(),
        }
    }
}

/// Result type using `TrackerError`.
pub type Result<T> = std::result::Result<T, TrackerError>;
