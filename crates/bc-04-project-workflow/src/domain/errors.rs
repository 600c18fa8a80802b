//! # Domain Errors

use bc_01_hierarchy::HierarchyError;
use bc_03_action_authorizer::AuthorizationError;
use bc_05_ledger_orchestrator::LedgerError;
use bc_06_audit_recorder::AuditError;
use shared_types::{ActionType, ErrorKind, OrgId, ProjectId, SignerIdentity};
use std::time::Duration;
use thiserror::Error;

/// Content-store collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    #[error("content store call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("content encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("project {0} already exists")]
    ProjectExists(ProjectId),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("signer {signer} is not a member of subject {subject}")]
    NotSubmitter { signer: SignerIdentity, subject: OrgId },

    /// Another transition holds the project's in-flight slot.
    #[error("project {project} has a {action} transition in flight; try later")]
    TransitionInProgress { project: ProjectId, action: ActionType },

    /// A different action is waiting on an unconfirmed ledger transaction.
    #[error("project {project} awaits confirmation of {tx_hash}; reconcile before proposing another action")]
    AwaitingConfirmation { project: ProjectId, tx_hash: String },

    #[error("project {0} has commits missing from the audit trail; reconcile the audit first")]
    NeedsReconciliation(ProjectId),

    /// Retry with the same signed action to poll again.
    #[error("ledger confirmation of {tx_hash} timed out")]
    LedgerTimeout { tx_hash: String },

    #[error("ledger reverted {tx_hash}: {reason}")]
    LedgerReverted { tx_hash: String, reason: String },

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            WorkflowError::ProjectExists(_) | WorkflowError::InvalidSubmission(_) => {
                ErrorKind::InvalidAction
            }
            WorkflowError::NotSubmitter { .. } => ErrorKind::NotAuthority,
            WorkflowError::TransitionInProgress { .. }
            | WorkflowError::AwaitingConfirmation { .. } => ErrorKind::TransitionInProgress,
            WorkflowError::NeedsReconciliation(_) => ErrorKind::StorageUnavailable,
            WorkflowError::LedgerTimeout { .. } => ErrorKind::LedgerTimeout,
            WorkflowError::LedgerReverted { .. } => ErrorKind::LedgerReverted,
            WorkflowError::Authorization(e) => e.kind(),
            WorkflowError::Hierarchy(e) => e.kind(),
            WorkflowError::Ledger(e) => e.kind(),
            WorkflowError::Audit(e) => e.kind(),
            WorkflowError::Content(_) => ErrorKind::StorageUnavailable,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
