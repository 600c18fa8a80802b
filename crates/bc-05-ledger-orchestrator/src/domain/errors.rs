//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

use super::entities::TxHash;

/// Ledger orchestration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Every send attempt failed.
    #[error("ledger unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// Transport failure reported by the ledger client.
    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("invalid ledger call: {0}")]
    InvalidCall(String),

    /// The idempotency key is already bound to a different call.
    #[error("idempotency key already used for a different call")]
    KeyConflict,

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unavailable { .. }
            | LedgerError::Transport(_)
            | LedgerError::UnknownTransaction(_) => ErrorKind::LedgerTimeout,
            LedgerError::Reverted(_) => ErrorKind::LedgerReverted,
            LedgerError::InvalidCall(_) => ErrorKind::InvalidAction,
            LedgerError::KeyConflict => ErrorKind::NonceReused,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
