//! In-memory audit store with a switchable outage, for tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::ProjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::domain::entities::AuditEntry;
use crate::domain::errors::{AuditError, AuditResult};
use crate::ports::outbound::AuditStore;

#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<HashMap<ProjectId, Vec<AuditEntry>>>,
    unavailable: AtomicBool,
    failing_appends: AtomicU32,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail only the next `n` appends.
    pub fn fail_next_appends(&self, n: u32) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    pub fn total_entries(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    fn check_available(&self) -> AuditResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuditError::StorageUnavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.check_available()?;
        let failing = self
            .failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(AuditError::StorageUnavailable("write rejected".into()));
        }
        self.entries
            .write()
            .entry(entry.project_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn history(&self, project: &ProjectId) -> AuditResult<Vec<AuditEntry>> {
        self.check_available()?;
        Ok(self.entries.read().get(project).cloned().unwrap_or_default())
    }

    async fn last_sequence(&self, project: &ProjectId) -> AuditResult<Option<u64>> {
        self.check_available()?;
        Ok(self
            .entries
            .read()
            .get(project)
            .and_then(|entries| entries.last())
            .map(|entry| entry.sequence))
    }
}
