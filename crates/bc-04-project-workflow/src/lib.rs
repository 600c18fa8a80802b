//! # Project Workflow (BC-04)
//!
//! Owns every project record and the only path that changes its stage.
//!
//! ```text
//! Submitted ──verify──→ NGOVerified ──localApprove──→ LocalApproved ──finalApprove──→ FinallyApproved(Minted)
//!     │                      │                             │
//!     └──────────────────────┴──────────reject─────────────┴──────────────────────→ Rejected
//! ```
//!
//! A transition is committed only after the ledger confirms it, and each
//! commit or revert gets exactly one audit entry. At most one transition per
//! project is in flight; a competing proposal fails fast.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `ProjectRecord`, `IssuanceCertificate`, errors
//! - **Ports Layer** (`ports/`): `WorkflowApi` (inbound), `ContentStore` (outbound)
//! - **Adapters** (`adapters/`): `InMemoryContentStore`
//! - **Service Layer** (`service.rs`): `ProjectWorkflow`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryContentStore, LOCATOR_SCHEME};
pub use domain::entities::{
    AwaitingConfirmation, IssuanceCertificate, PendingTransition, ProjectRecord, SubmitProject,
    TransitionOutcome, WorkflowConfig,
};
pub use domain::errors::{ContentError, WorkflowError, WorkflowResult};
pub use ports::inbound::WorkflowApi;
pub use ports::outbound::ContentStore;
pub use service::{ProjectWorkflow, WorkflowDeps};
