//! # Domain Entities

use serde::{Deserialize, Serialize};
use shared_types::{ProjectId, SignedAction, Stage, Timestamp};

/// Ledger outcome the entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AuditOutcome {
    Committed,
    /// Revert reason, verbatim from the ledger.
    Reverted { reason: String },
}

/// Append-only record of one signed action and what it produced.
///
/// Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub schema_version: u16,
    /// Per-project, starting at 1, gap-free, in commit order.
    pub sequence: u64,
    pub project_id: ProjectId,
    /// The signed action with its canonical message. Metadata is stored in
    /// the content store and referenced by `content_locator`.
    pub action: SignedAction,
    /// Stage after the action; unchanged for a revert.
    pub resulting_stage: Stage,
    pub ledger_tx: Option<String>,
    pub outcome: AuditOutcome,
    pub content_locator: Option<String>,
    pub recorded_at: Timestamp,
}

/// An entry before the recorder assigns sequence and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDraft {
    pub action: SignedAction,
    pub resulting_stage: Stage,
    pub ledger_tx: Option<String>,
    pub outcome: AuditOutcome,
    pub content_locator: Option<String>,
}

impl AuditDraft {
    pub fn project_id(&self) -> &ProjectId {
        self.action.project_id()
    }
}
