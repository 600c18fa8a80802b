//! # Domain Errors
//!
//! Every variant is a storage failure. Logical validation happened upstream,
//! so an append never fails for logical reasons.

use shared_types::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("audit storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("audit log corrupt at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("audit log {} is locked by another process", .0.display())]
    AlreadyLocked(PathBuf),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StorageUnavailable
    }
}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::StorageUnavailable(e.to_string())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
