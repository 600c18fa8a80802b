//! # Outbound Ports
//!
//! The document store holding the audit trail. Any append-only store works;
//! the recorder only needs ordered append and per-project reads.

use async_trait::async_trait;
use shared_types::ProjectId;

use crate::domain::entities::AuditEntry;
use crate::domain::errors::AuditResult;

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably append one entry.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Entries for `project` in append order.
    async fn history(&self, project: &ProjectId) -> AuditResult<Vec<AuditEntry>>;

    /// Highest sequence stored for `project`.
    async fn last_sequence(&self, project: &ProjectId) -> AuditResult<Option<u64>>;
}
