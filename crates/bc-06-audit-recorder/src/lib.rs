//! # Audit Recorder (BC-06)
//!
//! Append-only, per-project ordered record of every signed action and its
//! ledger outcome. An entry is written for every committed or reverted
//! transition, never for a rejected proposal.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `AuditEntry`, `AuditDraft`, `AuditOutcome`
//! - **Ports Layer** (`ports/`): `AuditStore` (outbound)
//! - **Service Layer** (`service.rs`): `AuditRecorder`
//! - **Adapters** (`adapters/`): `JsonlAuditStore`, `InMemoryAuditStore`
//!
//! ## Invariants
//!
//! - Sequences start at 1 and have no gaps within a project.
//! - Entries are never updated or deleted.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryAuditStore, JsonlAuditStore};
pub use domain::entities::{AuditDraft, AuditEntry, AuditOutcome};
pub use domain::errors::{AuditError, AuditResult};
pub use ports::outbound::AuditStore;
pub use service::{AuditRecorder, DEFAULT_APPEND_ATTEMPTS};
