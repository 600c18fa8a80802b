//! # Outbound Ports
//!
//! The ledger client collaborator, treated as an opaque RPC surface with
//! submit/confirm semantics only.

use async_trait::async_trait;

use crate::domain::entities::{LedgerCall, LedgerReceipt, TxHash};
use crate::domain::errors::LedgerResult;

/// Ledger client - outbound port.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Broadcast a call, returning its transaction hash.
    async fn send(&self, call: &LedgerCall) -> LedgerResult<TxHash>;

    /// Receipt for a mined transaction, `None` while still pending.
    async fn receipt(&self, tx_hash: &TxHash) -> LedgerResult<Option<LedgerReceipt>>;
}
