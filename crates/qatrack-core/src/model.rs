//! Core data types for qatrack-core.
//!
//! JSON uses camelCase field names so listings can be handed to web clients
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

/// The kinds of entity that carry sequential custom IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Issue,
    Task,
    Requirement,
    TestCase,
    TestSuite,
    TestExecution,
    Report,
    Invoice,
    Package,
}

impl EntityKind {
    pub const ALL: [Self; 9] = [
        Self::Issue,
        Self::Task,
        Self::Requirement,
        Self::TestCase,
        Self::TestSuite,
        Self::TestExecution,
        Self::Report,
        Self::Invoice,
        Self::Package,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Task => "task",
            Self::Requirement => "requirement",
            Self::TestCase => "test_case",
            Self::TestSuite => "test_suite",
            Self::TestExecution => "test_execution",
            Self::Report => "report",
            Self::Invoice => "invoice",
            Self::Package => "package",
        }
    }

    /// Human-facing singular label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Issue => "Issue",
            Self::Task => "Task",
            Self::Requirement => "Requirement",
            Self::TestCase => "Test case",
            Self::TestSuite => "Test suite",
            Self::TestExecution => "Test execution",
            Self::Report => "Report",
            Self::Invoice => "Invoice",
            Self::Package => "Package",
        }
    }

    /// Display pattern seeded by `qt init`.
    #[must_use]
    pub const fn default_pattern(&self) -> &'static str {
        match self {
            Self::Issue => "BUG-{customId}",
            Self::Task => "TASK-{customId}",
            Self::Requirement => "REQ-{customId}",
            Self::TestCase => "TC-{customId}",
            Self::TestSuite => "TS-{customId}",
            Self::TestExecution => "EXE-{customId}",
            Self::Report => "RPT-{customId}",
            Self::Invoice => "INV-{customId}",
            Self::Package => "PKG-{customId}",
        }
    }

    /// Free-text fields matched by a search string.
    #[must_use]
    pub const fn search_fields(&self) -> &'static [SearchField] {
        match self {
            Self::Issue | Self::Task => &[
                SearchField::Title,
                SearchField::Description,
                SearchField::OwnerName,
                SearchField::AssigneeName,
            ],
            Self::TestCase => &[
                SearchField::Title,
                SearchField::Description,
                SearchField::GroupName,
            ],
            Self::Report | Self::TestExecution => &[SearchField::Title, SearchField::OwnerName],
            Self::Requirement
            | Self::TestSuite
            | Self::Invoice
            | Self::Package => &[SearchField::Title, SearchField::Description],
        }
    }

    /// Kind of the sub-collection an entity of this kind belongs to.
    #[must_use]
    pub const fn group_kind(&self) -> Option<Self> {
        match self {
            Self::TestCase => Some(Self::TestSuite),
            _ => None,
        }
    }

    /// Kind referenced by the `references` list.
    #[must_use]
    pub const fn reference_kind(&self) -> Option<Self> {
        match self {
            Self::TestCase | Self::Issue | Self::Task => Some(Self::Requirement),
            _ => None,
        }
    }

    /// Status given to new entities when none is supplied.
    #[must_use]
    pub const fn initial_status(&self) -> Status {
        match self {
            Self::Issue | Self::Report => Status::New,
            _ => Status::Open,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        let trimmed = normalized.strip_suffix('s').unwrap_or(&normalized);
        match trimmed {
            "issue" | "bug" => Ok(Self::Issue),
            "task" => Ok(Self::Task),
            "requirement" | "req" => Ok(Self::Requirement),
            "test_case" | "testcase" | "tc" => Ok(Self::TestCase),
            "test_suite" | "testsuite" | "suite" => Ok(Self::TestSuite),
            "test_execution" | "testexecution" | "execution" => Ok(Self::TestExecution),
            "report" => Ok(Self::Report),
            "invoice" => Ok(Self::Invoice),
            "package" => Ok(Self::Package),
            _ => Err(TrackerError::InvalidKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Free-text fields that can take part in a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Title,
    Description,
    OwnerName,
    AssigneeName,
    GroupName,
}

/// Entity lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Untriaged: hidden from clients.
    #[default]
    New,
    Open,
    Assigned,
    InProgress,
    Fixed,
    Retest,
    Verified,
    Closed,
    Reopened,
    Approved,
    Rejected,
    Passed,
    Failed,
    Blocked,
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Open => "OPEN",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Fixed => "FIXED",
            Self::Retest => "RETEST",
            Self::Verified => "VERIFIED",
            Self::Closed => "CLOSED",
            Self::Reopened => "REOPENED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "new" => Ok(Self::New),
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "fixed" => Ok(Self::Fixed),
            "retest" => Ok(Self::Retest),
            "verified" => Ok(Self::Verified),
            "closed" => Ok(Self::Closed),
            "reopened" => Ok(Self::Reopened),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "passed" | "pass" => Ok(Self::Passed),
            "failed" | "fail" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(TrackerError::InvalidStatus {
                status: s.to_string(),
            }),
        }
    }
}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" | "minor" => Ok(Self::Low),
            "medium" | "major" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" | "blocker" => Ok(Self::Critical),
            _ => Err(TrackerError::InvalidSeverity {
                severity: s.to_string(),
            }),
        }
    }
}

/// Work priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" | "p3" => Ok(Self::Low),
            "medium" | "normal" | "p2" => Ok(Self::Medium),
            "high" | "urgent" | "p1" => Ok(Self::High),
            _ => Err(TrackerError::InvalidPriority {
                priority: s.to_string(),
            }),
        }
    }
}

/// Caller role, deciding which entities a listing may reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client,
    Tester,
    #[default]
    Other,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Tester => "tester",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "admin" => Ok(Self::Admin),
            "client" | "project_client" => Ok(Self::Client),
            "tester" | "project_tester" => Ok(Self::Tester),
            "other" | "crowd_tester" | "developer" => Ok(Self::Other),
            _ => Err(TrackerError::InvalidRole {
                role: s.to_string(),
            }),
        }
    }
}

/// One step of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

/// One named input of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItem {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub value: String,
}

/// A tracked entity: issue, task, requirement, test case and so on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Store-assigned internal identifier.
    pub id: i64,

    pub kind: EntityKind,

    /// Owning project.
    pub project_id: String,

    /// Sequence value issued at creation; never reassigned.
    pub custom_id: u64,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    /// Creator (reporter) user id.
    pub owner_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,

    /// Internal id of the owning sub-collection (e.g. test suite).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_data: Vec<DataItem>,

    /// Custom IDs of referenced entities (see [`EntityKind::reference_kind`]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            id: 0,
            kind: EntityKind::Issue,
            project_id: String::new(),
            custom_id: 0,
            title: String::new(),
            description: None,
            status: Status::default(),
            severity: None,
            priority: None,
            owner_id: String::new(),
            owner_name: None,
            assignee_id: None,
            assignee_name: None,
            group_id: None,
            group_name: None,
            steps: Vec::new(),
            test_data: Vec::new(),
            references: Vec::new(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }
}

impl Entity {
    /// Text of a searchable field, if present.
    #[must_use]
    pub fn search_text(&self, field: SearchField) -> Option<&str> {
        match field {
            SearchField::Title => Some(self.title.as_str()),
            SearchField::Description => self.description.as_deref(),
            SearchField::OwnerName => self.owner_name.as_deref(),
            SearchField::AssigneeName => self.assignee_name.as_deref(),
            SearchField::GroupName => self.group_name.as_deref(),
        }
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Lowercase, trim, and fold spaces/hyphens to underscores.
fn normalize_token(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_accepts_aliases() {
        assert_eq!("issues".parse::<EntityKind>().unwrap(), EntityKind::Issue);
        assert_eq!("Test Case".parse::<EntityKind>().unwrap(), EntityKind::TestCase);
        assert_eq!("test-suites".parse::<EntityKind>().unwrap(), EntityKind::TestSuite);
        assert_eq!("REQ".parse::<EntityKind>().unwrap(), EntityKind::Requirement);
        assert!("widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_status_roundtrip_through_str() {
        for status in [Status::New, Status::InProgress, Status::Approved, Status::Fixed] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert_eq!("in progress".parse::<Status>().unwrap(), Status::InProgress);
        assert!(matches!("FIXD".parse::<Status>(), Err(TrackerError::InvalidStatus { .. })));
        assert!("  ".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serde_uses_screaming_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let parsed: Status = serde_json::from_str("\"FIXED\"").unwrap();
        assert_eq!(parsed, Status::Fixed);
    }

    #[test]
    fn test_role_aliases() {
        assert_eq!("project-client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("Project Tester".parse::<Role>().unwrap(), Role::Tester);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_severity_and_priority_parse() {
        assert_eq!("Blocker".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("extreme".parse::<Severity>().is_err());
        assert!("".parse::<Priority>().is_err());
    }

    #[test]
    fn test_entity_json_is_camel_case() {
        let entity = Entity {
            custom_id: 7,
            project_id: "p1".to_string(),
            title: "Login fails".to_string(),
            owner_id: "u1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["customId"], 7);
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["status"], "NEW");
        assert!(json.get("description").is_none());
    }
}
