//! # Error Types
//!
//! Stable error-kind tags returned across every caller-facing operation, and
//! the identifier validation error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable, programmatically branchable error tag.
///
/// Component errors carry the details (required role, current stage, revert
/// reason); this tag is what callers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotAuthority,
    AlreadyLinked,
    NotLinked,
    InvalidSignatureFormat,
    StaleTimestamp,
    NonceReused,
    WrongStage,
    AlreadyFinal,
    TransitionInProgress,
    LedgerTimeout,
    LedgerReverted,
    StorageUnavailable,
    SignerMismatch,
    ProjectNotFound,
    UnknownOrganization,
    InvalidAction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthority => "NotAuthority",
            ErrorKind::AlreadyLinked => "AlreadyLinked",
            ErrorKind::NotLinked => "NotLinked",
            ErrorKind::InvalidSignatureFormat => "InvalidSignatureFormat",
            ErrorKind::StaleTimestamp => "StaleTimestamp",
            ErrorKind::NonceReused => "NonceReused",
            ErrorKind::WrongStage => "WrongStage",
            ErrorKind::AlreadyFinal => "AlreadyFinal",
            ErrorKind::TransitionInProgress => "TransitionInProgress",
            ErrorKind::LedgerTimeout => "LedgerTimeout",
            ErrorKind::LedgerReverted => "LedgerReverted",
            ErrorKind::StorageUnavailable => "StorageUnavailable",
            ErrorKind::SignerMismatch => "SignerMismatch",
            ErrorKind::ProjectNotFound => "ProjectNotFound",
            ErrorKind::UnknownOrganization => "UnknownOrganization",
            ErrorKind::InvalidAction => "InvalidAction",
        }
    }

    /// Only a timed-out ledger call or a busy project can succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::LedgerTimeout | ErrorKind::TransitionInProgress)
    }

    /// Authorization failures are terminal for the request.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotAuthority
                | ErrorKind::NotLinked
                | ErrorKind::InvalidSignatureFormat
                | ErrorKind::SignerMismatch
                | ErrorKind::StaleTimestamp
                | ErrorKind::NonceReused
                | ErrorKind::WrongStage
                | ErrorKind::AlreadyFinal
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected identifier input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} contains invalid character {found:?}")]
    InvalidCharacter { kind: &'static str, found: char },

    #[error("signer identity must be 0x followed by 40 hex characters")]
    InvalidAddress,

    #[error("nonce must be between {min} and {max} characters")]
    NonceLength { min: usize, max: usize },
}
