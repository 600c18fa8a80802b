//! # Shared Types Crate
//!
//! Identifiers, workflow stages, the `SignedAction` envelope and the stable
//! error-kind tags shared by every registry component.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-component types are defined here.
//! - **Explicit Identity**: There is no ambient "current user". Every
//!   operation receives the acting `SignerIdentity` explicitly.
//! - **Versioned Records**: Persisted records carry `SCHEMA_VERSION` so that
//!   stored state can be migrated forward without one-off scripts.

pub mod clock;
pub mod entities;
pub mod envelope;
pub mod errors;

pub use clock::{SystemTimeSource, TimeSource, Timestamp};
pub use entities::*;
pub use envelope::{IdempotencyKey, ProposedAction, SignedAction};
pub use errors::{ErrorKind, IdentifierError};

/// Schema version stamped on every persisted record
/// (`ProjectRecord`, `Link`, `Organization`, `AuditEntry`).
pub const SCHEMA_VERSION: u16 = 1;
