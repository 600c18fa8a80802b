//! # Inbound Ports

use async_trait::async_trait;
use shared_types::SignedAction;

use crate::domain::entities::{AuthorizedAction, ProjectContext};
use crate::domain::errors::AuthorizationResult;

/// The single gate every stage transition passes through.
#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Validates `signed` against `project` and reserves its nonce.
    async fn authorize(
        &self,
        signed: &SignedAction,
        project: ProjectContext<'_>,
    ) -> AuthorizationResult<AuthorizedAction>;

    /// Marks the action's nonce as spent after a terminal ledger outcome.
    fn consume(&self, signed: &SignedAction);

    /// Drops the reservation of an attempt that failed before its ledger
    /// call was submitted.
    fn release(&self, signed: &SignedAction);
}
