//! `qatrack-core` - role-scoped listings and sequential display IDs.
//!
//! Store-agnostic building blocks for a QA tracker: a sequence counter that
//! issues per-project custom IDs, a display-ID formatter, a role-scoped query
//! builder, a paginated listing service and CSV export/import. The
//! [`InMemoryStore`] implements [`EntityStore`] without any database.
//!
//! # Quick Start
//!
//! ```
//! use qatrack_core::{EntityDraft, EntityKind, InMemoryStore, ListingLimits, ListingRequest, Role};
//! use qatrack_core::{create_entity, list};
//!
//! let store = InMemoryStore::with_default_formats();
//! create_entity(&store, EntityDraft::new(EntityKind::Issue, "web", "Crash on save"), "ada").unwrap();
//!
//! let request = ListingRequest::new("web", Role::Admin, "ada");
//! let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
//! assert_eq!(page.total, 1);
//! assert_eq!(page.items[0].display_id, "BUG-1");
//! ```

pub mod counter;
pub mod display_id;
pub mod error;
pub mod listing;
pub mod model;
pub mod query;
pub mod scope;
pub mod store;
pub mod transfer;
pub mod util;

pub use counter::{SequenceCounter, SequenceKey};
pub use display_id::{DisplayIdFormat, DisplayIds};
pub use error::{Result, TrackerError};
pub use listing::{Listed, ListingLimits, ListingResult, list, list_all};
pub use model::{DataItem, Entity, EntityKind, Priority, Role, Severity, Status, Step};
pub use query::{Filter, ListingRequest, Predicate, StoreQuery, Window};
pub use scope::{VisibilityPolicy, base_query, build_filter, policy_for};
pub use store::{EntityDraft, EntityStore, InMemoryStore, create_entity};
