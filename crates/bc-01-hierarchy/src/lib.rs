//! # Hierarchy Store (BC-01)
//!
//! Holds the organizational tree (authority → verifying organizations →
//! managed subjects) and answers "may signer A act on subject S at stage K?".
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): organizations, links, tree invariants and
//!   the entitlement table
//! - **Ports Layer** (`ports/`): `HierarchyApi`
//! - **Service Layer** (`service.rs`): `HierarchyStore`, the lock-guarded
//!   implementation
//!
//! ## Invariants
//!
//! - The hierarchy is a tree with a single national root.
//! - At most one active link per subject, enforced under the write lock.
//! - Only authorities reassign subjects; regional authorities only within
//!   their region.
//! - Revocation keeps link history.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::entities::{
    AssignMode, AuthorityScope, Link, LinkStatus, OrgKind, Organization, Permissions,
};
pub use domain::errors::{HierarchyError, HierarchyResult};
pub use domain::tree::{AssignOutcome, HierarchyState};
pub use ports::inbound::HierarchyApi;
pub use service::HierarchyStore;
