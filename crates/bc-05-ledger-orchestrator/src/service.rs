//! # Ledger Orchestrator Service
//!
//! Submits the ledger call for an authorized transition and tracks it until
//! a receipt arrives.
//!
//! ## Idempotency
//!
//! ```text
//! submit(key) ──lock slot(key)──→ pending[key]? ──yes──→ return existing ref
//!                                     │
//!                                     no
//!                                     ↓
//!                      send (retry with linear backoff) ──→ pending[key] = ref
//! ```
//!
//! Submissions under the same key are serialized by a per-key async slot;
//! distinct keys never contend.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{ActionType, IdempotencyKey, SystemTimeSource, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::entities::{
    Confirmation, LedgerCall, OrchestratorConfig, PendingTxRef, ReceiptOutcome, TransitionPayload,
    TxHash,
};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::ports::inbound::TransitionLedger;
use crate::ports::outbound::LedgerClient;

pub struct LedgerOrchestrator {
    client: Arc<dyn LedgerClient>,
    config: OrchestratorConfig,
    time_source: Arc<dyn TimeSource>,
    slots: Mutex<HashMap<IdempotencyKey, Arc<tokio::sync::Mutex<()>>>>,
    pending: RwLock<HashMap<IdempotencyKey, PendingTxRef>>,
}

impl LedgerOrchestrator {
    pub fn new(client: Arc<dyn LedgerClient>, config: OrchestratorConfig) -> Self {
        Self::with_time_source(client, config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        client: Arc<dyn LedgerClient>,
        config: OrchestratorConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            client,
            config,
            time_source,
            slots: Mutex::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &IdempotencyKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.slots.lock().entry(key.clone()).or_default())
    }

    async fn send_with_retry(&self, call: &LedgerCall) -> LedgerResult<TxHash> {
        let attempts = self.config.max_submit_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.client.send(call).await {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        method = call.method(),
                        error = %e,
                        "[bc-05] Ledger send failed"
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.submit_backoff * attempt).await;
                    }
                }
            }
        }
        Err(LedgerError::Unavailable {
            attempts,
            last_error,
        })
    }

    async fn poll_until_mined(&self, tx_hash: &TxHash) -> Confirmation {
        loop {
            match self.client.receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return match &receipt.outcome {
                        ReceiptOutcome::Success { .. } => Confirmation::Confirmed(receipt),
                        ReceiptOutcome::Reverted { reason } => {
                            Confirmation::Reverted(reason.clone())
                        }
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(tx_hash = %tx_hash, error = %e, "[bc-05] Receipt poll failed, retrying");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl TransitionLedger for LedgerOrchestrator {
    async fn submit(
        &self,
        kind: ActionType,
        project_ref: &str,
        payload: TransitionPayload,
        key: &IdempotencyKey,
    ) -> LedgerResult<PendingTxRef> {
        let call = LedgerCall::for_transition(kind, project_ref, payload)?;
        let slot = self.slot(key);
        let _guard = slot.lock().await;

        if let Some(existing) = self.pending(key) {
            if existing.call != call {
                return Err(LedgerError::KeyConflict);
            }
            debug!(key = %key, tx_hash = %existing.tx_hash, "[bc-05] Reusing pending submission");
            return Ok(existing);
        }

        let tx_hash = self.send_with_retry(&call).await?;
        let pending = PendingTxRef {
            tx_hash,
            key: key.clone(),
            call,
            submitted_at: self.time_source.now(),
        };
        self.pending.write().insert(key.clone(), pending.clone());
        info!(
            key = %key,
            tx_hash = %pending.tx_hash,
            method = pending.call.method(),
            "[bc-05] Ledger call submitted"
        );
        Ok(pending)
    }

    async fn await_confirmation(
        &self,
        pending: &PendingTxRef,
        timeout: Duration,
    ) -> LedgerResult<Confirmation> {
        let confirmation = match tokio::time::timeout(timeout, self.poll_until_mined(&pending.tx_hash)).await {
            Ok(confirmation) => confirmation,
            Err(_) => Confirmation::TimedOut,
        };
        match &confirmation {
            Confirmation::Confirmed(receipt) => info!(
                tx_hash = %pending.tx_hash,
                block = receipt.block_number,
                "[bc-05] Transaction confirmed"
            ),
            Confirmation::Reverted(reason) => warn!(
                tx_hash = %pending.tx_hash,
                reason = %reason,
                "[bc-05] Transaction reverted"
            ),
            Confirmation::TimedOut => warn!(
                tx_hash = %pending.tx_hash,
                timeout_ms = timeout.as_millis() as u64,
                "[bc-05] Confirmation timed out"
            ),
        }
        Ok(confirmation)
    }

    fn pending(&self, key: &IdempotencyKey) -> Option<PendingTxRef> {
        self.pending.read().get(key).cloned()
    }

    fn forget(&self, key: &IdempotencyKey) {
        self.pending.write().remove(key);
        self.slots.lock().remove(key);
    }
}
