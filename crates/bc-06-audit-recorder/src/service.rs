//! # Audit Recorder Service
//!
//! Assigns per-project sequence numbers and appends entries to the store.
//!
//! ```text
//! append(draft) ──lock slot(p)──→ last = slot[p] or store.last_sequence(p)
//!                                      │
//!                                      ↓
//!                       store.append(entry{seq: last + 1})  (bounded retries)
//!                                      │
//!                          ok ─────────┴──────── err
//!                      slot[p] = last + 1     StorageUnavailable, slot untouched
//! ```
//!
//! Each project has its own async slot, held across the store call and its
//! backoff; appends for distinct projects never wait on each other.

use parking_lot::Mutex;
use shared_types::{ProjectId, SystemTimeSource, TimeSource, SCHEMA_VERSION};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::entities::{AuditDraft, AuditEntry};
use crate::domain::errors::{AuditError, AuditResult};
use crate::ports::outbound::AuditStore;

pub const DEFAULT_APPEND_ATTEMPTS: u32 = 3;
const APPEND_BACKOFF: Duration = Duration::from_millis(50);

pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    append_attempts: u32,
    time_source: Arc<dyn TimeSource>,
    /// Last recorded sequence per project; `None` until read from the store.
    sequences: Mutex<HashMap<ProjectId, Arc<tokio::sync::Mutex<Option<u64>>>>>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, append_attempts: u32) -> Self {
        Self::with_time_source(store, append_attempts, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        store: Arc<dyn AuditStore>,
        append_attempts: u32,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            append_attempts: append_attempts.max(1),
            time_source,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, project: &ProjectId) -> Arc<tokio::sync::Mutex<Option<u64>>> {
        Arc::clone(self.sequences.lock().entry(project.clone()).or_default())
    }

    /// Appends `draft` as the next entry of its project.
    ///
    /// Appends for one project are serialized, so sequences stay gap-free
    /// even under concurrent callers. A failed append does not consume a
    /// sequence number.
    pub async fn append(&self, draft: AuditDraft) -> AuditResult<AuditEntry> {
        let project = draft.project_id().clone();
        let slot = self.slot(&project);
        let mut sequence = slot.lock().await;

        let last = match *sequence {
            Some(last) => last,
            None => self.store.last_sequence(&project).await?.unwrap_or(0),
        };

        let entry = AuditEntry {
            schema_version: SCHEMA_VERSION,
            sequence: last + 1,
            project_id: project.clone(),
            action: draft.action,
            resulting_stage: draft.resulting_stage,
            ledger_tx: draft.ledger_tx,
            outcome: draft.outcome,
            content_locator: draft.content_locator,
            recorded_at: self.time_source.now(),
        };

        let mut last_error = None;
        for attempt in 1..=self.append_attempts {
            match self.store.append(&entry).await {
                Ok(()) => {
                    *sequence = Some(entry.sequence);
                    info!(
                        project = %entry.project_id,
                        sequence = entry.sequence,
                        stage = entry.resulting_stage.as_str(),
                        "[bc-06] Audit entry recorded"
                    );
                    return Ok(entry);
                }
                Err(e) => {
                    warn!(
                        project = %entry.project_id,
                        attempt,
                        max_attempts = self.append_attempts,
                        error = %e,
                        "[bc-06] Audit append failed"
                    );
                    last_error = Some(e);
                    if attempt < self.append_attempts {
                        tokio::time::sleep(APPEND_BACKOFF * attempt).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(AuditError::StorageUnavailable(reason)) => AuditError::StorageUnavailable(reason),
            Some(other) => AuditError::StorageUnavailable(other.to_string()),
            None => AuditError::StorageUnavailable("no append attempted".into()),
        })
    }

    /// Entries for `project` in sequence order.
    pub async fn history(&self, project: &ProjectId) -> AuditResult<Vec<AuditEntry>> {
        let mut entries = self.store.history(project).await?;
        entries.sort_by_key(|entry| entry.sequence);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAuditStore;
    use crate::domain::entities::AuditOutcome;
    use shared_types::clock::MockTimeSource;
    use shared_types::{Nonce, ProposedAction, SignedAction, SignerIdentity, Stage};

    fn draft(project: &str, nonce: &str, stage: Stage) -> AuditDraft {
        AuditDraft {
            action: SignedAction {
                action: ProposedAction::Verify {
                    project_id: ProjectId::parse(project).unwrap(),
                },
                signer: SignerIdentity::from_address([9; 20]),
                timestamp: 1_000,
                nonce: Nonce::parse(nonce).unwrap(),
                canonical_message: "message".into(),
                signature: "0x00".into(),
                metadata: None,
            },
            resulting_stage: stage,
            ledger_tx: Some("0x01".into()),
            outcome: AuditOutcome::Committed,
            content_locator: None,
        }
    }

    fn setup() -> (Arc<InMemoryAuditStore>, AuditRecorder) {
        let store = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::with_time_source(
            store.clone(),
            DEFAULT_APPEND_ATTEMPTS,
            Arc::new(MockTimeSource::new(42)),
        );
        (store, recorder)
    }

    #[tokio::test]
    async fn test_sequences_are_per_project() {
        let (_store, recorder) = setup();
        let a1 = recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified)).await.unwrap();
        let b1 = recorder.append(draft("P2", "nonce-0002", Stage::NgoVerified)).await.unwrap();
        let a2 = recorder.append(draft("P1", "nonce-0003", Stage::LocalApproved)).await.unwrap();
        assert_eq!((a1.sequence, b1.sequence, a2.sequence), (1, 1, 2));
        assert_eq!(a2.recorded_at, 42);

        let history = recorder.history(&ProjectId::parse("P1").unwrap()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].resulting_stage, Stage::LocalApproved);
    }

    #[tokio::test]
    async fn test_sequence_resumes_from_store() {
        let store = Arc::new(InMemoryAuditStore::new());
        {
            let recorder = AuditRecorder::new(store.clone(), 1);
            recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified)).await.unwrap();
        }
        let recorder = AuditRecorder::new(store, 1);
        let entry = recorder.append(draft("P1", "nonce-0002", Stage::LocalApproved)).await.unwrap();
        assert_eq!(entry.sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let (store, recorder) = setup();
        store.fail_next_appends(2);
        let entry = recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified)).await.unwrap();
        assert_eq!(entry.sequence, 1);
        assert_eq!(store.total_entries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_does_not_consume_sequence() {
        let (store, recorder) = setup();
        recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified)).await.unwrap();

        store.fail_next_appends(DEFAULT_APPEND_ATTEMPTS);
        let err = recorder
            .append(draft("P1", "nonce-0002", Stage::LocalApproved))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::StorageUnavailable(_)));
        assert_eq!(err.kind(), shared_types::ErrorKind::StorageUnavailable);

        let entry = recorder.append(draft("P1", "nonce-0002", Stage::LocalApproved)).await.unwrap();
        assert_eq!(entry.sequence, 2);
    }

    /// Never completes appends for one project.
    struct StalledStore {
        inner: InMemoryAuditStore,
        stalled: ProjectId,
    }

    #[async_trait::async_trait]
    impl AuditStore for StalledStore {
        async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
            if entry.project_id == self.stalled {
                std::future::pending::<()>().await;
            }
            self.inner.append(entry).await
        }

        async fn history(&self, project: &ProjectId) -> AuditResult<Vec<AuditEntry>> {
            self.inner.history(project).await
        }

        async fn last_sequence(&self, project: &ProjectId) -> AuditResult<Option<u64>> {
            self.inner.last_sequence(project).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_project_does_not_block_others() {
        let store = Arc::new(StalledStore {
            inner: InMemoryAuditStore::new(),
            stalled: ProjectId::parse("P1").unwrap(),
        });
        let recorder = AuditRecorder::new(store, DEFAULT_APPEND_ATTEMPTS);

        let stuck = recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified));
        tokio::pin!(stuck);
        tokio::select! {
            biased;
            _ = &mut stuck => panic!("stalled append completed"),
            other = tokio::time::timeout(
                Duration::from_millis(10),
                recorder.append(draft("P2", "nonce-0002", Stage::NgoVerified)),
            ) => {
                let entry = other.expect("P2 waited on P1").unwrap();
                assert_eq!(entry.sequence, 1);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_backoff_is_per_project() {
        let (store, recorder) = setup();
        store.fail_next_appends(1);

        // P1 takes the failure and sleeps in backoff while P2 appends.
        let (p1, p2) = tokio::join!(
            recorder.append(draft("P1", "nonce-0001", Stage::NgoVerified)),
            async {
                tokio::task::yield_now().await;
                let started = tokio::time::Instant::now();
                let entry = recorder
                    .append(draft("P2", "nonce-0002", Stage::NgoVerified))
                    .await;
                (entry, started.elapsed())
            }
        );
        assert_eq!(p1.unwrap().sequence, 1);
        let (p2, waited) = p2;
        assert_eq!(p2.unwrap().sequence, 1);
        assert_eq!(waited, Duration::ZERO);
    }
}
