use qatrack_core::{Entity, EntityKind, Listed, TrackerError};
use qatrack_core::transfer::ImportReport;
use serde::Serialize;

/// Entity with resolved display IDs for the show view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetails {
    #[serde(flatten)]
    pub listed: Listed,
    /// Display IDs of referenced entities, in stored order.
    pub reference_ids: Vec<String>,
}

/// Page of a listing with its window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<Listed>,
    pub total: usize,
    pub skip: i64,
    pub limit: i64,
}

/// Display pattern of one kind.
#[derive(Debug, Clone, Serialize)]
pub struct FormatEntry {
    pub kind: EntityKind,
    pub pattern: Option<String>,
    pub example: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub kind: EntityKind,
    pub rows: usize,
    /// `None` when written to stdout.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub kind: EntityKind,
    pub file: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    #[serde(flatten)]
    pub listed: Listed,
}

impl Created {
    #[must_use]
    pub fn new(entity: Entity, display_id: String) -> Self {
        Self {
            listed: Listed { entity, display_id },
        }
    }
}

/// Machine-readable error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorOutput {
    /// Build the envelope; non-tracker errors get the generic `E_INTERNAL` code.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<TrackerError>() {
            Some(tracker) => Self {
                code: tracker.code().to_string(),
                message: tracker.user_message(),
                retryable: tracker.is_retryable(),
            },
            None => Self {
                code: "E_INTERNAL".to_string(),
                message: format!("{err:#}"),
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_output_hides_store_details() {
        let err = anyhow::Error::new(TrackerError::unavailable("disk I/O error at page 7"));
        let out = ErrorOutput::from_error(&err);
        assert_eq!(out.code, "E_STORE_UNAVAILABLE");
        assert!(out.retryable);
        assert!(!out.message.contains("page 7"));
    }

    #[test]
    fn test_error_output_keeps_context() {
        let err = anyhow::anyhow!("boom").context("while exporting");
        let out = ErrorOutput::from_error(&err);
        assert_eq!(out.code, "E_INTERNAL");
        assert!(out.message.contains("while exporting"));
        assert!(out.message.contains("boom"));
    }

    #[test]
    fn test_details_flatten() {
        let details = EntityDetails {
            listed: Listed {
                entity: Entity {
                    custom_id: 3,
                    title: "Login".to_string(),
                    ..Entity::default()
                },
                display_id: "TC-3".to_string(),
            },
            reference_ids: vec!["REQ-1".to_string()],
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["displayId"], "TC-3");
        assert_eq!(json["customId"], 3);
        assert_eq!(json["referenceIds"][0], "REQ-1");
    }
}
