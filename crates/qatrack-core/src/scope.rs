//! Role-scoped query construction.
//!
//! Each entity kind has one [`VisibilityPolicy`]. The policy narrows a base
//! query according to the caller's role; structured filters and the free-text
//! search are ANDed on afterwards, so a search can only ever shrink what the
//! role already allows.

use crate::display_id::{DisplayIds, parse_bare};
use crate::model::{EntityKind, Role, Status};
use crate::query::{Filter, Predicate, StoreQuery};

/// Visibility rule for one entity kind.
pub trait VisibilityPolicy: Send + Sync {
    /// Predicates to AND onto the base query for `role`.
    ///
    /// An empty list means no narrowing.
    fn narrow(&self, role: Role, caller_id: &str) -> Vec<Predicate>;

    fn name(&self) -> &'static str;
}

/// Issues: the untriaged state is hidden from anyone who did not report it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UntriagedHidden;

impl VisibilityPolicy for UntriagedHidden {
    fn narrow(&self, role: Role, caller_id: &str) -> Vec<Predicate> {
        match role {
            Role::Admin => Vec::new(),
            Role::Client => vec![Predicate::StatusNot(Status::New)],
            Role::Tester | Role::Other => vec![Predicate::Any(vec![
                Predicate::OwnedBy(caller_id.to_string()),
                Predicate::StatusNot(Status::New),
            ])],
        }
    }

    fn name(&self) -> &'static str {
        "untriaged-hidden"
    }
}

/// Reports: only approved reports are visible beyond their author.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalGated;

impl VisibilityPolicy for ApprovalGated {
    fn narrow(&self, role: Role, caller_id: &str) -> Vec<Predicate> {
        match role {
            Role::Admin => Vec::new(),
            Role::Client => vec![Predicate::StatusIs(Status::Approved)],
            Role::Tester | Role::Other => vec![Predicate::Any(vec![
                Predicate::OwnedBy(caller_id.to_string()),
                Predicate::StatusIs(Status::Approved),
            ])],
        }
    }

    fn name(&self) -> &'static str {
        "approval-gated"
    }
}

/// Tasks: testers only see tasks they created or are assigned to.
#[derive(Debug, Clone, Copy, Default)]
pub struct Participants;

impl VisibilityPolicy for Participants {
    fn narrow(&self, role: Role, caller_id: &str) -> Vec<Predicate> {
        match role {
            Role::Admin | Role::Client => Vec::new(),
            Role::Tester | Role::Other => vec![Predicate::Any(vec![
                Predicate::OwnedBy(caller_id.to_string()),
                Predicate::AssignedTo(caller_id.to_string()),
            ])],
        }
    }

    fn name(&self) -> &'static str {
        "participants"
    }
}

/// Invoices: visible to the paying client and admins only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientBilling;

impl VisibilityPolicy for ClientBilling {
    fn narrow(&self, role: Role, _caller_id: &str) -> Vec<Predicate> {
        match role {
            Role::Admin | Role::Client => Vec::new(),
            Role::Tester | Role::Other => vec![Predicate::Nothing],
        }
    }

    fn name(&self) -> &'static str {
        "client-billing"
    }
}

/// Everything else is project-wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenVisibility;

impl VisibilityPolicy for OpenVisibility {
    fn narrow(&self, _role: Role, _caller_id: &str) -> Vec<Predicate> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "open"
    }
}

/// The policy governing `kind`.
#[must_use]
pub fn policy_for(kind: EntityKind) -> &'static dyn VisibilityPolicy {
    match kind {
        EntityKind::Issue => &UntriagedHidden,
        EntityKind::Report => &ApprovalGated,
        EntityKind::Task => &Participants,
        EntityKind::Invoice => &ClientBilling,
        EntityKind::Requirement
        | EntityKind::TestCase
        | EntityKind::TestSuite
        | EntityKind::TestExecution
        | EntityKind::Package => &OpenVisibility,
    }
}

/// Base query for a kind within a project: project match, soft-deleted rows
/// excluded.
#[must_use]
pub fn base_query(kind: EntityKind, project_id: &str) -> StoreQuery {
    StoreQuery::new(kind)
        .with(Predicate::Project(project_id.to_string()))
        .with(Predicate::NotDeleted)
}

/// Narrow `base` for the caller and AND on the extra filters.
///
/// Order: base, role narrowing, structured filters, search. A numeric search
/// string also matches the bare custom ID.
#[must_use]
pub fn build_filter(base: StoreQuery, role: Role, caller_id: &str, extra: &[Filter]) -> StoreQuery {
    build_filter_with_ids(base, role, caller_id, extra, &DisplayIds::default())
}

/// Like [`build_filter`], but a search string that parses as a display ID of
/// the queried kind also matches that custom ID.
#[must_use]
pub fn build_filter_with_ids(
    base: StoreQuery,
    role: Role,
    caller_id: &str,
    extra: &[Filter],
    ids: &DisplayIds,
) -> StoreQuery {
    let kind = base.kind;
    let policy = policy_for(kind);
    let mut query = base;
    query.predicates.extend(policy.narrow(role, caller_id));
    tracing::trace!(kind = %kind, %role, policy = policy.name(), "Applied visibility policy");

    let mut search = None;
    for filter in extra {
        match filter {
            Filter::Status(statuses) if statuses.is_empty() => {}
            Filter::Status(statuses) => query.predicates.push(Predicate::StatusIn(statuses.clone())),
            Filter::Severity(severity) => query.predicates.push(Predicate::SeverityIs(*severity)),
            Filter::Priority(priority) => query.predicates.push(Predicate::PriorityIs(*priority)),
            Filter::DateRange { from, to } => {
                if let Some(from) = from {
                    query.predicates.push(Predicate::CreatedFrom(*from));
                }
                if let Some(to) = to {
                    query.predicates.push(Predicate::CreatedTo(*to));
                }
            }
            Filter::Search(needle) => {
                let needle = needle.trim();
                if !needle.is_empty() {
                    search = Some(needle);
                }
            }
        }
    }

    if let Some(needle) = search {
        let custom_id = ids
            .parse(kind, needle)
            .or_else(|_| parse_bare(needle))
            .ok();
        query.predicates.push(Predicate::Search {
            needle: needle.to_string(),
            fields: kind.search_fields().to_vec(),
            custom_id,
        });
    }

    query
}
