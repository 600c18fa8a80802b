//! # Action Authorizer (BC-03)
//!
//! The one place role and stage logic lives. Every proposed transition is
//! validated here before the workflow touches project state.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `AuthorizedAction`, `NonceRegistry`, errors
//! - **Ports Layer** (`ports/`): `AuthorizationApi` (inbound)
//! - **Service Layer** (`service.rs`): `ActionAuthorizer`
//!
//! ## Dependencies
//!
//! | Collaborator | Used for |
//! |--------------|----------|
//! | `HierarchyApi` (bc-01) | role entitlement per action |
//! | `SignatureCodec` (bc-02) | canonical message, format, freshness |
//! | `SignerRecovery` (bc-02) | who actually signed |

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::entities::{
    AuthorizedAction, NonceState, ProjectContext, MAX_METADATA_LEN, MAX_REASON_LEN,
};
pub use domain::errors::{AuthorizationError, AuthorizationResult};
pub use domain::nonce::{NonceCheck, NonceRegistry};
pub use ports::inbound::AuthorizationApi;
pub use service::ActionAuthorizer;
