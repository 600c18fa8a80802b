//! # Project Workflow Service
//!
//! ## Transition Pipeline
//!
//! ```text
//! propose(signed)
//!   │ claim in-flight slot (project mutex) ── busy ──→ TransitionInProgress
//!   ↓
//! authorize (bc-03) ──→ store metadata / certificate ──→ submit (bc-05)
//!   │  └── fails before submit ──→ release nonce reservation
//!   ↓
//! record awaiting_confirmation
//!   ↓
//! await confirmation ── timeout ──→ LedgerTimeout (awaiting kept)
//!   │            └──── revert ──→ audit(Reverted), LedgerReverted
//!   ↓
//! commit stage ──→ audit(Committed) ── fails ──→ backlog, StorageUnavailable
//!   ↓
//! publish events, release slot
//! ```
//!
//! The slot is released by a drop guard, so a dropped (cancelled) proposal
//! never leaves a project stuck. A submitted call is recorded on the project
//! before its receipt is awaited, so a cancelled caller leaves it to be
//! resumed or reconciled, never forgotten. Once the ledger has confirmed,
//! the commit tail runs on its own task and finishes even if the caller
//! goes away.

use async_trait::async_trait;
use bc_01_hierarchy::{HierarchyApi, OrgKind};
use bc_03_action_authorizer::{AuthorizationApi, AuthorizationError, ProjectContext};
use bc_05_ledger_orchestrator::{Confirmation, ReceiptOutcome, TransitionLedger, TransitionPayload};
use bc_06_audit_recorder::{AuditDraft, AuditEntry, AuditError, AuditOutcome, AuditRecorder};
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventPublisher, RegistryEvent};
use shared_types::{OrgId, ProjectId, ProposedAction, SignedAction, Stage, TimeSource};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{
    AwaitingConfirmation, IssuanceCertificate, PendingTransition, ProjectRecord, SubmitProject,
    TransitionOutcome, WorkflowConfig,
};
use crate::domain::errors::{ContentError, WorkflowError, WorkflowResult};
use crate::ports::inbound::WorkflowApi;
use crate::ports::outbound::ContentStore;

/// Collaborators the workflow drives.
pub struct WorkflowDeps {
    pub hierarchy: Arc<dyn HierarchyApi>,
    pub authorizer: Arc<dyn AuthorizationApi>,
    pub ledger: Arc<dyn TransitionLedger>,
    pub recorder: Arc<AuditRecorder>,
    pub content: Arc<dyn ContentStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub time_source: Arc<dyn TimeSource>,
}

type ProjectHandle = Arc<Mutex<ProjectRecord>>;

/// Clears the project's in-flight slot when dropped.
struct InFlightSlot {
    record: ProjectHandle,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.record.lock().pending_transition = None;
    }
}

/// Releases the nonce reservation of an attempt dropped before its ledger
/// call was submitted.
struct Reservation {
    authorizer: Arc<dyn AuthorizationApi>,
    action: Option<SignedAction>,
}

impl Reservation {
    fn submitted(mut self) {
        self.action = None;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            self.authorizer.release(&action);
        }
    }
}

enum Claim {
    /// First presentation: a snapshot of the committed record.
    Fresh(Box<ProjectRecord>),
    /// Re-presentation of an action whose receipt never arrived.
    Resume(Box<AwaitingConfirmation>),
}

pub struct ProjectWorkflow {
    hierarchy: Arc<dyn HierarchyApi>,
    authorizer: Arc<dyn AuthorizationApi>,
    ledger: Arc<dyn TransitionLedger>,
    recorder: Arc<AuditRecorder>,
    content: Arc<dyn ContentStore>,
    publisher: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    config: WorkflowConfig,
    projects: RwLock<HashMap<ProjectId, ProjectHandle>>,
    /// Outcomes committed but not yet in the audit trail, in commit order.
    backlog: Arc<Mutex<VecDeque<AuditDraft>>>,
    reconcile_lock: tokio::sync::Mutex<()>,
}

impl ProjectWorkflow {
    pub fn new(deps: WorkflowDeps, config: WorkflowConfig) -> Self {
        Self {
            hierarchy: deps.hierarchy,
            authorizer: deps.authorizer,
            ledger: deps.ledger,
            recorder: deps.recorder,
            content: deps.content,
            publisher: deps.publisher,
            time_source: deps.time_source,
            config,
            projects: RwLock::new(HashMap::new()),
            backlog: Arc::new(Mutex::new(VecDeque::new())),
            reconcile_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }

    fn handle(&self, id: &ProjectId) -> WorkflowResult<ProjectHandle> {
        self.projects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::ProjectNotFound(id.clone()))
    }

    fn claim(
        &self,
        record: &ProjectHandle,
        signed: &SignedAction,
    ) -> WorkflowResult<(InFlightSlot, Claim)> {
        let key = signed.idempotency_key();
        let mut guard = record.lock();

        if let Some(in_flight) = &guard.pending_transition {
            return Err(WorkflowError::TransitionInProgress {
                project: guard.id.clone(),
                action: in_flight.action,
            });
        }
        if guard.needs_reconciliation {
            return Err(WorkflowError::NeedsReconciliation(guard.id.clone()));
        }

        let claim = match &guard.awaiting_confirmation {
            Some(awaiting) if awaiting.pending.key == key => {
                if awaiting.action.payload_digest() != signed.payload_digest() {
                    return Err(AuthorizationError::NonceReused {
                        signer: signed.signer.clone(),
                        nonce: signed.nonce.clone(),
                    }
                    .into());
                }
                Claim::Resume(Box::new(awaiting.clone()))
            }
            Some(awaiting) => {
                return Err(WorkflowError::AwaitingConfirmation {
                    project: guard.id.clone(),
                    tx_hash: awaiting.pending.tx_hash.to_string(),
                })
            }
            None => Claim::Fresh(Box::new(guard.clone())),
        };

        guard.pending_transition = Some(PendingTransition {
            action: signed.action_type(),
            key,
            started_at: self.time_source.now(),
        });
        drop(guard);
        Ok((
            InFlightSlot {
                record: Arc::clone(record),
            },
            claim,
        ))
    }

    async fn put_content(&self, blob: Vec<u8>) -> WorkflowResult<String> {
        match tokio::time::timeout(self.config.content_timeout, self.content.put(blob)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ContentError::TimedOut(self.config.content_timeout).into()),
        }
    }

    async fn get_content(&self, locator: &str) -> WorkflowResult<Option<Vec<u8>>> {
        match tokio::time::timeout(self.config.content_timeout, self.content.get(locator)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ContentError::TimedOut(self.config.content_timeout).into()),
        }
    }

    /// Authorizes a first presentation, submits its ledger call and records
    /// the submission on the project.
    async fn submit(
        &self,
        record: &ProjectHandle,
        project: &ProjectRecord,
        signed: &SignedAction,
    ) -> WorkflowResult<AwaitingConfirmation> {
        let key = signed.idempotency_key();
        let submitted = self.ledger.pending(&key).is_some();
        let authorized = self
            .authorizer
            .authorize(
                signed,
                ProjectContext {
                    subject: &project.subject_org,
                    stage: project.stage,
                    submitted,
                },
            )
            .await?;
        let reservation = Reservation {
            authorizer: Arc::clone(&self.authorizer),
            action: (!submitted).then(|| signed.clone()),
        };

        let metadata_locator = match &signed.metadata {
            Some(blob) => Some(self.put_content(blob.clone()).await?),
            None => None,
        };

        let (payload, certificate_locator) = match &signed.action {
            ProposedAction::Verify { .. } | ProposedAction::LocalApprove { .. } => {
                (TransitionPayload::Empty, None)
            }
            ProposedAction::FinalApprove { credit_amount, .. } => {
                let certificate = IssuanceCertificate::for_approval(project, signed, *credit_amount);
                let bytes = serde_json::to_vec(&certificate)
                    .map_err(|e| ContentError::Encoding(e.to_string()))?;
                let locator = self.put_content(bytes).await?;
                (
                    TransitionPayload::Mint {
                        credit_amount: *credit_amount,
                        token_uri: locator.clone(),
                    },
                    Some(locator),
                )
            }
            ProposedAction::Reject { reason, .. } => (
                TransitionPayload::Reason {
                    reason: reason.clone(),
                },
                None,
            ),
        };

        let pending = self
            .ledger
            .submit(
                signed.action_type(),
                &project.ledger_ref,
                payload,
                &authorized.idempotency_key,
            )
            .await?;
        reservation.submitted();

        let inflight = AwaitingConfirmation {
            pending,
            action: signed.without_metadata(),
            from_stage: project.stage,
            target_stage: authorized.target_stage,
            metadata_locator,
            certificate_locator,
        };
        record.lock().awaiting_confirmation = Some(inflight.clone());
        debug!(
            project = %project.id,
            tx_hash = %inflight.pending.tx_hash,
            "[bc-04] Submission recorded"
        );
        Ok(inflight)
    }

    /// Waits for the receipt and applies whichever outcome arrives.
    async fn settle(
        &self,
        record: ProjectHandle,
        slot: InFlightSlot,
        inflight: AwaitingConfirmation,
    ) -> WorkflowResult<TransitionOutcome> {
        let tx_hash = inflight.pending.tx_hash.to_string();
        let project_id = inflight.action.project_id().clone();
        let action_type = inflight.action.action_type();
        let confirmation = self
            .ledger
            .await_confirmation(&inflight.pending, self.config.confirmation_timeout)
            .await?;
        let now = self.time_source.now();

        match confirmation {
            Confirmation::TimedOut => {
                warn!(
                    project = %project_id,
                    tx_hash = %tx_hash,
                    "[bc-04] Confirmation timed out; transition left uncommitted"
                );
                Err(WorkflowError::LedgerTimeout { tx_hash })
            }

            Confirmation::Reverted(reason) => {
                {
                    let mut guard = record.lock();
                    guard.awaiting_confirmation = None;
                    guard.last_ledger_tx = Some(tx_hash.clone());
                    guard.updated_at = now;
                }
                self.authorizer.consume(&inflight.action);
                self.ledger.forget(&inflight.pending.key);

                let draft = AuditDraft {
                    action: inflight.action,
                    resulting_stage: inflight.from_stage,
                    ledger_tx: Some(tx_hash.clone()),
                    outcome: AuditOutcome::Reverted {
                        reason: reason.clone(),
                    },
                    content_locator: inflight.metadata_locator,
                };
                let events = vec![RegistryEvent::TransitionReverted {
                    project_id: project_id.clone(),
                    action: action_type,
                    reason: reason.clone(),
                    ledger_tx: tx_hash.clone(),
                }];
                if let Err(e) = self.record_outcome(Arc::clone(&record), slot, draft, events).await {
                    error!(project = %project_id, error = %e, "[bc-04] Revert not yet audited");
                }
                warn!(project = %project_id, reason = %reason, "[bc-04] Transition reverted");
                Err(WorkflowError::LedgerReverted { tx_hash, reason })
            }

            Confirmation::Confirmed(receipt) => {
                let (credits_issued, token_id) = match receipt.outcome {
                    ReceiptOutcome::Success {
                        credits_issued,
                        token_id,
                    } => (credits_issued, token_id),
                    ReceiptOutcome::Reverted { .. } => (None, None),
                };
                let minted = {
                    let mut guard = record.lock();
                    guard.stage = inflight.target_stage;
                    guard.updated_at = now;
                    guard.awaiting_confirmation = None;
                    guard.last_ledger_tx = Some(tx_hash.clone());
                    let mut minted = None;
                    match &inflight.action.action {
                        ProposedAction::FinalApprove { credit_amount, .. } => {
                            let issued = credits_issued.unwrap_or(*credit_amount);
                            guard.credits_minted = Some(issued);
                            guard.token_id = token_id;
                            if inflight.certificate_locator.is_some() {
                                guard.content_locator = inflight.certificate_locator.clone();
                            }
                            minted = Some(issued);
                        }
                        ProposedAction::Reject { reason, .. } => {
                            guard.rejection_reason = Some(reason.clone());
                        }
                        ProposedAction::Verify { .. } | ProposedAction::LocalApprove { .. } => {}
                    }
                    minted
                };
                self.authorizer.consume(&inflight.action);
                self.ledger.forget(&inflight.pending.key);
                info!(
                    project = %project_id,
                    from = %inflight.from_stage,
                    to = %inflight.target_stage,
                    tx_hash = %tx_hash,
                    block = receipt.block_number,
                    "[bc-04] Transition committed"
                );

                let mut events = vec![RegistryEvent::StageCommitted {
                    project_id: project_id.clone(),
                    from: inflight.from_stage,
                    to: inflight.target_stage,
                    action: action_type,
                    signer: inflight.action.signer.clone(),
                    ledger_tx: tx_hash.clone(),
                }];
                if let Some(credit_amount) = minted {
                    events.push(RegistryEvent::CreditsMinted {
                        project_id: project_id.clone(),
                        credit_amount,
                        token_id: token_id.map(|id| id.to_string()),
                        content_locator: inflight.certificate_locator.clone(),
                    });
                }

                let draft = AuditDraft {
                    content_locator: inflight
                        .certificate_locator
                        .clone()
                        .or(inflight.metadata_locator.clone()),
                    action: inflight.action,
                    resulting_stage: inflight.target_stage,
                    ledger_tx: Some(tx_hash.clone()),
                    outcome: AuditOutcome::Committed,
                };
                let entry = self
                    .record_outcome(Arc::clone(&record), slot, draft, events)
                    .await?;
                let project = record.lock().clone();
                Ok(TransitionOutcome {
                    project,
                    ledger_tx: tx_hash,
                    audit_sequence: entry.sequence,
                })
            }
        }
    }

    /// Appends the audit entry and publishes events on a detached task that
    /// owns the in-flight slot until it is done.
    async fn record_outcome(
        &self,
        record: ProjectHandle,
        slot: InFlightSlot,
        draft: AuditDraft,
        events: Vec<RegistryEvent>,
    ) -> WorkflowResult<AuditEntry> {
        let recorder = Arc::clone(&self.recorder);
        let publisher = Arc::clone(&self.publisher);
        let backlog = Arc::clone(&self.backlog);

        let task = tokio::spawn(async move {
            let _slot = slot;
            let result = recorder.append(draft.clone()).await;
            for event in events {
                publisher.publish(event).await;
            }
            match result {
                Ok(entry) => Ok(entry),
                Err(e) => {
                    let project_id = draft.project_id().clone();
                    let backlog_len = {
                        let mut queue = backlog.lock();
                        queue.push_back(draft);
                        queue.len()
                    };
                    record.lock().needs_reconciliation = true;
                    error!(
                        project = %project_id,
                        error = %e,
                        backlog_len,
                        "[bc-04] Audit append failed; outcome queued for reconciliation"
                    );
                    publisher
                        .publish(RegistryEvent::AuditBacklogged {
                            project_id,
                            backlog_len,
                        })
                        .await;
                    Err(WorkflowError::Audit(e))
                }
            }
        });

        task.await.map_err(|e| {
            WorkflowError::Audit(AuditError::StorageUnavailable(format!(
                "audit task aborted: {e}"
            )))
        })?
    }
}

#[async_trait]
impl WorkflowApi for ProjectWorkflow {
    async fn submit_project(&self, request: SubmitProject) -> WorkflowResult<ProjectRecord> {
        if request.name.trim().is_empty() {
            return Err(WorkflowError::InvalidSubmission("name is empty".into()));
        }
        if !request.area_hectares.is_finite() || request.area_hectares <= 0.0 {
            return Err(WorkflowError::InvalidSubmission(format!(
                "area must be a positive number of hectares, got {}",
                request.area_hectares
            )));
        }
        let subject = self.hierarchy.organization(&request.subject)?;
        if subject.kind != OrgKind::Subject {
            return Err(WorkflowError::InvalidSubmission(format!(
                "{} is not a subject organization",
                subject.id
            )));
        }
        if self.hierarchy.organization_of(&request.submitter).as_ref() != Some(&request.subject) {
            return Err(WorkflowError::NotSubmitter {
                signer: request.submitter.clone(),
                subject: request.subject.clone(),
            });
        }
        if self.projects.read().contains_key(&request.project_id) {
            return Err(WorkflowError::ProjectExists(request.project_id.clone()));
        }

        let content_locator = match &request.metadata {
            Some(blob) => Some(self.put_content(blob.clone()).await?),
            None => None,
        };
        let record = ProjectRecord::new(&request, content_locator, self.time_source.now());

        match self.projects.write().entry(record.id.clone()) {
            Entry::Occupied(_) => return Err(WorkflowError::ProjectExists(record.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(record.clone())));
            }
        }

        info!(
            project = %record.id,
            subject = %record.subject_org,
            "[bc-04] Project submitted"
        );
        self.publisher
            .publish(RegistryEvent::ProjectSubmitted {
                project_id: record.id.clone(),
                subject: record.subject_org.clone(),
                submitter: record.submitter.clone(),
            })
            .await;
        Ok(record)
    }

    async fn propose_transition(&self, signed: SignedAction) -> WorkflowResult<TransitionOutcome> {
        let record = self.handle(signed.project_id())?;
        let (slot, claim) = self.claim(&record, &signed)?;
        debug!(
            project = %signed.project_id(),
            action = %signed.action_type(),
            "[bc-04] In-flight slot claimed"
        );

        let inflight = match claim {
            Claim::Fresh(snapshot) => self.submit(&record, &snapshot, &signed).await?,
            Claim::Resume(awaiting) => {
                info!(
                    project = %signed.project_id(),
                    tx_hash = %awaiting.pending.tx_hash,
                    "[bc-04] Re-polling unconfirmed transition"
                );
                *awaiting
            }
        };
        self.settle(record, slot, inflight).await
    }

    fn project(&self, id: &ProjectId) -> WorkflowResult<ProjectRecord> {
        let handle = self.handle(id)?;
        let record = handle.lock().clone();
        Ok(record)
    }

    fn list_projects(&self, subject: Option<&OrgId>) -> Vec<ProjectRecord> {
        let mut projects: Vec<ProjectRecord> = self
            .projects
            .read()
            .values()
            .map(|handle| handle.lock().clone())
            .filter(|record| subject.map_or(true, |s| &record.subject_org == s))
            .collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        projects
    }

    async fn reconcile_pending(&self, id: &ProjectId) -> WorkflowResult<Option<TransitionOutcome>> {
        let record = self.handle(id)?;
        let (slot, awaiting) = {
            let mut guard = record.lock();
            if let Some(in_flight) = &guard.pending_transition {
                return Err(WorkflowError::TransitionInProgress {
                    project: id.clone(),
                    action: in_flight.action,
                });
            }
            let Some(awaiting) = guard.awaiting_confirmation.clone() else {
                return Ok(None);
            };
            guard.pending_transition = Some(PendingTransition {
                action: awaiting.action.action_type(),
                key: awaiting.pending.key.clone(),
                started_at: self.time_source.now(),
            });
            (
                InFlightSlot {
                    record: Arc::clone(&record),
                },
                awaiting,
            )
        };
        info!(project = %id, tx_hash = %awaiting.pending.tx_hash, "[bc-04] Reconciling pending transition");
        self.settle(record, slot, awaiting).await.map(Some)
    }

    async fn reconcile_audit(&self) -> WorkflowResult<usize> {
        let _running = self.reconcile_lock.lock().await;
        let mut appended = 0;
        loop {
            let next = self.backlog.lock().front().cloned();
            let Some(draft) = next else {
                break;
            };
            self.recorder.append(draft.clone()).await?;
            self.backlog.lock().pop_front();
            appended += 1;

            let project = draft.project_id();
            let still_queued = self
                .backlog
                .lock()
                .iter()
                .any(|queued| queued.project_id() == project);
            if !still_queued {
                if let Some(handle) = self.projects.read().get(project) {
                    handle.lock().needs_reconciliation = false;
                }
            }
        }
        if appended > 0 {
            info!(appended, "[bc-04] Audit backlog reconciled");
        }
        Ok(appended)
    }

    fn projects_needing_reconciliation(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self
            .projects
            .read()
            .values()
            .filter_map(|handle| {
                let record = handle.lock();
                (record.needs_reconciliation || record.awaiting_confirmation.is_some())
                    .then(|| record.id.clone())
            })
            .collect();
        ids.sort();
        ids
    }

    async fn issuance_certificate(
        &self,
        id: &ProjectId,
    ) -> WorkflowResult<Option<IssuanceCertificate>> {
        let record = self.project(id)?;
        if record.stage != Stage::Minted {
            return Ok(None);
        }
        let Some(locator) = record.content_locator else {
            return Ok(None);
        };
        let Some(bytes) = self.get_content(&locator).await? else {
            return Ok(None);
        };
        let certificate = serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::Encoding(e.to_string()))?;
        Ok(Some(certificate))
    }
}
