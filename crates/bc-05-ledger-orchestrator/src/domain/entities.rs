//! # Domain Entities
//!
//! Ledger calls, receipts and pending-transaction references.

use serde::{Deserialize, Serialize};
use shared_types::{ActionType, IdempotencyKey, Timestamp};
use std::fmt;
use std::time::Duration;

use super::errors::{LedgerError, LedgerResult};

/// Ledger transaction hash (`0x` + 64 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transition-specific data carried into the ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "camelCase")]
pub enum TransitionPayload {
    Empty,
    #[serde(rename_all = "camelCase")]
    Mint { credit_amount: u64, token_uri: String },
    Reason { reason: String },
}

/// Per-transition call on the registry contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum LedgerCall {
    #[serde(rename_all = "camelCase")]
    VerifyProject { project_ref: String },
    #[serde(rename_all = "camelCase")]
    ApproveProject { project_ref: String },
    #[serde(rename_all = "camelCase")]
    FinalApproveAndMint {
        project_ref: String,
        credit_amount: u64,
        token_uri: String,
    },
    #[serde(rename_all = "camelCase")]
    RejectProject { project_ref: String, reason: String },
}

impl LedgerCall {
    /// Maps a transition kind plus payload onto the contract call.
    pub fn for_transition(
        kind: ActionType,
        project_ref: &str,
        payload: TransitionPayload,
    ) -> LedgerResult<Self> {
        let project_ref = project_ref.to_string();
        match (kind, payload) {
            (ActionType::Verify, TransitionPayload::Empty) => {
                Ok(LedgerCall::VerifyProject { project_ref })
            }
            (ActionType::LocalApprove, TransitionPayload::Empty) => {
                Ok(LedgerCall::ApproveProject { project_ref })
            }
            (
                ActionType::FinalApprove,
                TransitionPayload::Mint {
                    credit_amount,
                    token_uri,
                },
            ) => Ok(LedgerCall::FinalApproveAndMint {
                project_ref,
                credit_amount,
                token_uri,
            }),
            (ActionType::Reject, TransitionPayload::Reason { reason }) => {
                Ok(LedgerCall::RejectProject { project_ref, reason })
            }
            (kind, payload) => Err(LedgerError::InvalidCall(format!(
                "{kind} does not take payload {payload:?}"
            ))),
        }
    }

    pub fn project_ref(&self) -> &str {
        match self {
            LedgerCall::VerifyProject { project_ref }
            | LedgerCall::ApproveProject { project_ref }
            | LedgerCall::FinalApproveAndMint { project_ref, .. }
            | LedgerCall::RejectProject { project_ref, .. } => project_ref,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            LedgerCall::VerifyProject { .. } => "verifyProject",
            LedgerCall::ApproveProject { .. } => "approveProject",
            LedgerCall::FinalApproveAndMint { .. } => "finalApproveAndMint",
            LedgerCall::RejectProject { .. } => "rejectProject",
        }
    }

    /// Stable textual encoding, `method|arg|arg...`.
    pub fn encode(&self) -> String {
        match self {
            LedgerCall::VerifyProject { project_ref } | LedgerCall::ApproveProject { project_ref } => {
                format!("{}|{}", self.method(), project_ref)
            }
            LedgerCall::FinalApproveAndMint {
                project_ref,
                credit_amount,
                token_uri,
            } => format!("{}|{}|{}|{}", self.method(), project_ref, credit_amount, token_uri),
            LedgerCall::RejectProject { project_ref, reason } => {
                format!("{}|{}|{}", self.method(), project_ref, reason)
            }
        }
    }
}

/// What a mined transaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReceiptOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        /// Credits issued by a mint call.
        credits_issued: Option<u64>,
        token_id: Option<u64>,
    },
    Reverted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub outcome: ReceiptOutcome,
}

/// A submitted, not yet confirmed, transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTxRef {
    pub tx_hash: TxHash,
    pub key: IdempotencyKey,
    pub call: LedgerCall,
    pub submitted_at: Timestamp,
}

/// Result of waiting on a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(LedgerReceipt),
    TimedOut,
    /// Revert reason, verbatim.
    Reverted(String),
}

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub max_submit_attempts: u32,
    /// Linear backoff step between send attempts.
    pub submit_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_submit_attempts: 3,
            submit_backoff: Duration::from_millis(200),
        }
    }
}
