//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use shared_types::{ActionType, IdempotencyKey};
use std::time::Duration;

use crate::domain::entities::{Confirmation, PendingTxRef, TransitionPayload};
use crate::domain::errors::LedgerResult;

/// Ledger orchestration API used by the project workflow.
#[async_trait]
pub trait TransitionLedger: Send + Sync {
    /// Submit the call for a transition.
    ///
    /// Idempotent per `key`: a repeated submit returns the existing pending
    /// reference without contacting the ledger again.
    async fn submit(
        &self,
        kind: ActionType,
        project_ref: &str,
        payload: TransitionPayload,
        key: &IdempotencyKey,
    ) -> LedgerResult<PendingTxRef>;

    /// Poll until the transaction is mined or `timeout` elapses.
    ///
    /// Cancel-safe: dropping the future stops polling and leaves the pending
    /// reference intact.
    async fn await_confirmation(
        &self,
        pending: &PendingTxRef,
        timeout: Duration,
    ) -> LedgerResult<Confirmation>;

    /// Pending reference previously submitted under `key`.
    fn pending(&self, key: &IdempotencyKey) -> Option<PendingTxRef>;

    /// Drop the record for `key` once its outcome is final.
    fn forget(&self, key: &IdempotencyKey);
}
