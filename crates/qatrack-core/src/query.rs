//! Filter and predicate types for listing operations.
//!
//! [`Filter`] is what a caller asks for; [`Predicate`] is the store-neutral
//! query language both stores understand. A [`StoreQuery`] is a conjunction
//! of predicates for one entity kind.

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackerError, ValidationError};
use crate::model::{Entity, EntityKind, Priority, Role, SearchField, Severity, Status};

/// One caller-supplied filter dimension.
///
/// A dimension the caller did not ask for is simply not in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Status(Vec<Status>),
    Severity(Severity),
    Priority(Priority),
    DateRange {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    Search(String),
}

/// A single store-neutral condition on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Project(String),
    NotDeleted,
    StatusIn(Vec<Status>),
    StatusIs(Status),
    StatusNot(Status),
    SeverityIs(Severity),
    PriorityIs(Priority),
    CreatedFrom(DateTime<Utc>),
    CreatedTo(DateTime<Utc>),
    OwnedBy(String),
    AssignedTo(String),
    /// Case-insensitive substring match over `fields`, or an exact custom ID
    /// when the needle parsed as a display ID.
    Search {
        needle: String,
        fields: Vec<SearchField>,
        custom_id: Option<u64>,
    },
    /// Disjunction.
    Any(Vec<Predicate>),
    /// Matches no entity.
    Nothing,
}

impl Predicate {
    /// Evaluate against an entity in memory.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::Project(project) => entity.project_id == *project,
            Self::NotDeleted => !entity.is_deleted(),
            Self::StatusIn(statuses) => statuses.contains(&entity.status),
            Self::StatusIs(status) => entity.status == *status,
            Self::StatusNot(status) => entity.status != *status,
            Self::SeverityIs(severity) => entity.severity == Some(*severity),
            Self::PriorityIs(priority) => entity.priority == Some(*priority),
            Self::CreatedFrom(from) => entity.created_at >= *from,
            Self::CreatedTo(to) => entity.created_at <= *to,
            Self::OwnedBy(owner) => entity.owner_id == *owner,
            Self::AssignedTo(assignee) => entity.assignee_id.as_deref() == Some(assignee.as_str()),
            Self::Search {
                needle,
                fields,
                custom_id,
            } => {
                if custom_id.is_some_and(|id| entity.custom_id == id) {
                    return true;
                }
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    entity
                        .search_text(*field)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
            Self::Any(options) => options.iter().any(|p| p.matches(entity)),
            Self::Nothing => false,
        }
    }
}

/// A resolved, role-scoped query for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub kind: EntityKind,
    /// All must hold.
    pub predicates: Vec<Predicate>,
}

impl StoreQuery {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            predicates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind == self.kind && self.predicates.iter().all(|p| p.matches(entity))
    }

    /// True when some predicate can never match.
    #[must_use]
    pub fn is_empty_set(&self) -> bool {
        self.predicates.iter().any(|p| matches!(p, Predicate::Nothing))
    }
}

/// Skip/limit window applied after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    pub limit: usize,
}

impl Window {
    #[must_use]
    pub const fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }
}

/// Inbound listing request as handed over by a route handler or the CLI.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub project_id: String,
    pub role: Role,
    pub caller_id: String,
    pub search: Option<String>,
    pub status: Vec<Status>,
    pub severity: Option<Severity>,
    pub priority: Option<Priority>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

impl ListingRequest {
    #[must_use]
    pub fn new(project_id: impl Into<String>, role: Role, caller_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            role,
            caller_id: caller_id.into(),
            search: None,
            status: Vec::new(),
            severity: None,
            priority: None,
            date_from: None,
            date_to: None,
            skip: 0,
            limit: 20,
        }
    }

    #[must_use]
    pub const fn page(mut self, skip: i64, limit: i64) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }

    /// Check the structural constraints that must hold before any store access.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the first offending field, or
    /// `ValidationErrors` when several fields are wrong.
    pub fn validate(&self, max_page_size: usize) -> Result<Window> {
        let mut errors = Vec::new();

        if self.caller_id.trim().is_empty() {
            errors.push(ValidationError::new("callerId", "must not be empty"));
        }
        if self.project_id.trim().is_empty() {
            errors.push(ValidationError::new("projectId", "must not be empty"));
        }
        if self.skip < 0 {
            errors.push(ValidationError::new("skip", "must be >= 0"));
        }
        let max = i64::try_from(max_page_size).unwrap_or(i64::MAX);
        if self.limit <= 0 || self.limit > max {
            errors.push(ValidationError::new(
                "limit",
                format!("must be between 1 and {max_page_size}"),
            ));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                errors.push(ValidationError::new("dateFrom", "must not be after dateTo"));
            }
        }

        if !errors.is_empty() {
            return Err(TrackerError::from_validation_errors(errors));
        }

        let skip = usize::try_from(self.skip).map_err(|_| TrackerError::validation("skip", "out of range"))?;
        let limit = usize::try_from(self.limit).map_err(|_| TrackerError::validation("limit", "out of range"))?;
        Ok(Window::new(skip, limit))
    }

    /// The caller's filter dimensions, structured filters before search.
    #[must_use]
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if !self.status.is_empty() {
            filters.push(Filter::Status(self.status.clone()));
        }
        if let Some(severity) = self.severity {
            filters.push(Filter::Severity(severity));
        }
        if let Some(priority) = self.priority {
            filters.push(Filter::Priority(priority));
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            filters.push(Filter::DateRange {
                from: self.date_from,
                to: self.date_to,
            });
        }
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                filters.push(Filter::Search(search.to_string()));
            }
        }
        filters
    }
}
