//! In-Memory Ledger Adapter
//!
//! Implements `LedgerClient` with a scriptable outcome per transaction, for
//! tests and local runs. Behaves like the registry contract in one respect:
//! a second mint for the same project reverts.

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::domain::entities::{LedgerCall, LedgerReceipt, ReceiptOutcome, TxHash};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::ports::outbound::LedgerClient;

/// How transactions sent from now on will resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBehaviour {
    /// Mine successfully after the given number of pending polls.
    ConfirmAfter(u32),
    /// Mine with a revert after the given number of pending polls.
    RevertAfter(u32, String),
    /// Stay pending forever.
    NeverConfirm,
}

impl Default for LedgerBehaviour {
    fn default() -> Self {
        LedgerBehaviour::ConfirmAfter(0)
    }
}

#[derive(Debug, Clone)]
struct TxRecord {
    call: LedgerCall,
    behaviour: LedgerBehaviour,
    polls: u32,
    receipt: Option<LedgerReceipt>,
}

#[derive(Debug, Default)]
struct LedgerState {
    txs: HashMap<TxHash, TxRecord>,
    behaviour: LedgerBehaviour,
    failing_sends: u32,
    minted_projects: HashSet<String>,
    block_number: u64,
    next_token_id: u64,
    calls: Vec<LedgerCall>,
}

/// Scriptable in-memory ledger.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    sends: AtomicU64,
    polls: AtomicU64,
    sequence: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            sends: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    /// Script the outcome of transactions sent from now on.
    pub fn set_behaviour(&self, behaviour: LedgerBehaviour) {
        self.state.write().behaviour = behaviour;
    }

    /// Make the next `n` sends fail with a transport error.
    pub fn fail_next_sends(&self, n: u32) {
        self.state.write().failing_sends = n;
    }

    /// Re-script an already sent transaction, e.g. to let a stuck one mine.
    pub fn resolve(&self, tx_hash: &TxHash, behaviour: LedgerBehaviour) {
        if let Some(tx) = self.state.write().txs.get_mut(tx_hash) {
            tx.behaviour = behaviour;
            tx.polls = 0;
        }
    }

    /// Successful `send` calls plus failed attempts.
    pub fn send_count(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn receipt_polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Calls accepted so far, in order.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state.read().calls.clone()
    }

    pub fn is_minted(&self, project_ref: &str) -> bool {
        self.state.read().minted_projects.contains(project_ref)
    }

    fn tx_hash(&self, call: &LedgerCall) -> TxHash {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(call.encode().as_bytes());
        TxHash::from_bytes(hasher.finalize().into())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn mine(state: &mut LedgerState, tx_hash: &TxHash, record: &TxRecord, revert: Option<String>) -> LedgerReceipt {
    state.block_number += 1;
    let outcome = match (revert, &record.call) {
        (Some(reason), _) => ReceiptOutcome::Reverted { reason },
        (None, LedgerCall::FinalApproveAndMint { project_ref, credit_amount, .. }) => {
            if state.minted_projects.insert(project_ref.clone()) {
                state.next_token_id += 1;
                ReceiptOutcome::Success {
                    credits_issued: Some(*credit_amount),
                    token_id: Some(state.next_token_id),
                }
            } else {
                ReceiptOutcome::Reverted {
                    reason: "project already minted".to_string(),
                }
            }
        }
        (None, _) => ReceiptOutcome::Success {
            credits_issued: None,
            token_id: None,
        },
    };
    LedgerReceipt {
        tx_hash: tx_hash.clone(),
        block_number: state.block_number,
        outcome,
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn send(&self, call: &LedgerCall) -> LedgerResult<TxHash> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.write();
            if state.failing_sends > 0 {
                state.failing_sends -= 1;
                return Err(LedgerError::Transport("connection refused".to_string()));
            }
        }

        let tx_hash = self.tx_hash(call);
        let mut state = self.state.write();
        let behaviour = state.behaviour.clone();
        state.calls.push(call.clone());
        state.txs.insert(
            tx_hash.clone(),
            TxRecord {
                call: call.clone(),
                behaviour,
                polls: 0,
                receipt: None,
            },
        );
        info!(tx_hash = %tx_hash, method = call.method(), "[bc-05] In-memory ledger accepted call");
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: &TxHash) -> LedgerResult<Option<LedgerReceipt>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        let mut record = state
            .txs
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownTransaction(tx_hash.clone()))?;

        if let Some(receipt) = &record.receipt {
            return Ok(Some(receipt.clone()));
        }

        let ready = match &record.behaviour {
            LedgerBehaviour::ConfirmAfter(n) => (record.polls >= *n).then_some(None),
            LedgerBehaviour::RevertAfter(n, reason) => {
                (record.polls >= *n).then(|| Some(reason.clone()))
            }
            LedgerBehaviour::NeverConfirm => None,
        };

        let receipt = match ready {
            Some(revert) => Some(mine(&mut state, tx_hash, &record, revert)),
            None => {
                record.polls += 1;
                None
            }
        };
        record.receipt = receipt.clone();
        state.txs.insert(tx_hash.clone(), record);
        debug!(tx_hash = %tx_hash, mined = receipt.is_some(), "[bc-05] Receipt polled");
        Ok(receipt)
    }
}
