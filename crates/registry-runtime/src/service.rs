//! # Registry Service
//!
//! The caller-facing operation surface. Every result carries a stable
//! `ErrorKind` so callers branch on the tag, never on message text.
//!
//! | Operation | Component |
//! |-----------|-----------|
//! | `submit_project` | bc-04 |
//! | `propose_transition` | bc-04 (via bc-03, bc-05, bc-06) |
//! | `get_project_state` | bc-04 |
//! | `get_history` | bc-06 |
//! | `assign_subject_to_verifier` | bc-01 |
//! | `revoke_link` | bc-01 |

use std::fmt;
use std::sync::Arc;

use bc_01_hierarchy::{
    AssignMode, AssignOutcome, HierarchyApi, HierarchyError, Link, Organization, Permissions,
};
use bc_04_project_workflow::{
    IssuanceCertificate, ProjectRecord, SubmitProject, TransitionOutcome, WorkflowApi,
    WorkflowError,
};
use bc_06_audit_recorder::{AuditEntry, AuditError};
use carbon_telemetry::{
    HistogramTimer, AUDIT_APPEND_FAILURES, AUDIT_BACKLOG, CREDITS_MINTED, LEDGER_OUTCOMES,
    LINK_CHANGES, PROJECTS_SUBMITTED, TRANSITIONS_COMMITTED, TRANSITIONS_PROPOSED,
    TRANSITIONS_REJECTED, TRANSITION_DURATION,
};
use serde::{Deserialize, Serialize};
use shared_bus::{EventFilter, EventPublisher, RegistryEvent, Subscription};
use shared_types::{
    ActionType, ErrorKind, LinkId, OrgId, ProjectId, RegionCode, SignedAction, SignerIdentity,
};
use tracing::{debug, info, warn};

use crate::container::RegistryContainer;

/// Error returned across the operation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RegistryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RegistryError {}

impl From<WorkflowError> for RegistryError {
    fn from(e: WorkflowError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<HierarchyError> for RegistryError {
    fn from(e: HierarchyError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<AuditError> for RegistryError {
    fn from(e: AuditError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Organization to add to the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrgRegistration {
    Root {
        id: OrgId,
        name: String,
    },
    LocalAuthority {
        id: OrgId,
        name: String,
        region: RegionCode,
        parent: OrgId,
    },
    Verifier {
        id: OrgId,
        name: String,
        parent: OrgId,
    },
    Subject {
        id: OrgId,
        name: String,
        region: RegionCode,
        parent: OrgId,
    },
}

/// Outcome of one background reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Projects whose unconfirmed transition was settled.
    pub settled: Vec<ProjectId>,
    /// Projects still waiting on the ledger.
    pub still_pending: Vec<ProjectId>,
    /// Backlogged audit entries written.
    pub audit_appended: usize,
}

pub struct RegistryService {
    container: Arc<RegistryContainer>,
}

impl RegistryService {
    pub fn new(container: Arc<RegistryContainer>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &RegistryContainer {
        &self.container
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    pub async fn submit_project(&self, request: SubmitProject) -> RegistryResult<ProjectRecord> {
        let record = self.container.workflow.submit_project(request).await?;
        PROJECTS_SUBMITTED.inc();
        Ok(record)
    }

    pub async fn propose_transition(&self, signed: SignedAction) -> RegistryResult<TransitionOutcome> {
        let action = signed.action_type();
        let label = action.wire_name();
        TRANSITIONS_PROPOSED.with_label_values(&[label]).inc();

        let timer = HistogramTimer::new(&TRANSITION_DURATION.with_label_values(&[label]));
        let result = self.container.workflow.propose_transition(signed).await;
        drop(timer);

        match &result {
            Ok(outcome) => {
                TRANSITIONS_COMMITTED.with_label_values(&[label]).inc();
                LEDGER_OUTCOMES.with_label_values(&["confirmed"]).inc();
                if action == ActionType::FinalApprove {
                    if let Some(credits) = outcome.project.credits_minted {
                        CREDITS_MINTED.inc_by(credits as f64);
                    }
                }
            }
            Err(e) => {
                TRANSITIONS_REJECTED
                    .with_label_values(&[label, e.kind().as_str()])
                    .inc();
                match e {
                    WorkflowError::LedgerTimeout { .. } => {
                        LEDGER_OUTCOMES.with_label_values(&["timed_out"]).inc()
                    }
                    WorkflowError::LedgerReverted { .. } => {
                        LEDGER_OUTCOMES.with_label_values(&["reverted"]).inc()
                    }
                    WorkflowError::Ledger(_) => {
                        LEDGER_OUTCOMES.with_label_values(&["unavailable"]).inc()
                    }
                    WorkflowError::Audit(_) => {
                        LEDGER_OUTCOMES.with_label_values(&["confirmed"]).inc();
                        AUDIT_APPEND_FAILURES.inc();
                    }
                    _ => {}
                }
                debug!(action = label, kind = %e.kind(), "Proposal not committed");
            }
        }
        AUDIT_BACKLOG.set(self.container.workflow.backlog_len() as f64);
        Ok(result?)
    }

    pub fn get_project_state(&self, id: &ProjectId) -> RegistryResult<ProjectRecord> {
        Ok(self.container.workflow.project(id)?)
    }

    /// Audit entries of an existing project, oldest first.
    pub async fn get_history(&self, id: &ProjectId) -> RegistryResult<Vec<AuditEntry>> {
        self.container.workflow.project(id)?;
        Ok(self.container.recorder.history(id).await?)
    }

    pub fn list_projects(&self, subject: Option<&OrgId>) -> Vec<ProjectRecord> {
        self.container.workflow.list_projects(subject)
    }

    pub async fn issuance_certificate(
        &self,
        id: &ProjectId,
    ) -> RegistryResult<Option<IssuanceCertificate>> {
        Ok(self.container.workflow.issuance_certificate(id).await?)
    }

    // =========================================================================
    // HIERARCHY
    // =========================================================================

    pub async fn assign_subject_to_verifier(
        &self,
        by: &SignerIdentity,
        subject: &OrgId,
        verifier: &OrgId,
        permissions: Permissions,
        mode: AssignMode,
    ) -> RegistryResult<AssignOutcome> {
        let outcome = self
            .container
            .hierarchy
            .assign_subject(by, subject, verifier, permissions, mode)?;
        let operation = if outcome.replaced.is_some() { "replace" } else { "assign" };
        LINK_CHANGES.with_label_values(&[operation]).inc();
        self.container
            .bus
            .publish(RegistryEvent::LinkAssigned {
                link_id: outcome.link.id.clone(),
                subject: subject.clone(),
                verifier: verifier.clone(),
                replaced: outcome.replaced.clone(),
            })
            .await;
        Ok(outcome)
    }

    pub async fn revoke_link(&self, id: &LinkId, by: &SignerIdentity) -> RegistryResult<Link> {
        let link = self.container.hierarchy.revoke_link(id, by)?;
        LINK_CHANGES.with_label_values(&["revoke"]).inc();
        self.container
            .bus
            .publish(RegistryEvent::LinkRevoked {
                link_id: link.id.clone(),
                subject: link.subject.clone(),
                verifier: link.verifier.clone(),
            })
            .await;
        Ok(link)
    }

    pub fn register_organization(&self, registration: OrgRegistration) -> RegistryResult<Organization> {
        let hierarchy = &self.container.hierarchy;
        let id = match registration {
            OrgRegistration::Root { id, name } => {
                hierarchy.register_root_authority(id.clone(), name)?;
                id
            }
            OrgRegistration::LocalAuthority {
                id,
                name,
                region,
                parent,
            } => {
                hierarchy.register_local_authority(id.clone(), name, region, &parent)?;
                id
            }
            OrgRegistration::Verifier { id, name, parent } => {
                hierarchy.register_verifier(id.clone(), name, &parent)?;
                id
            }
            OrgRegistration::Subject {
                id,
                name,
                region,
                parent,
            } => {
                hierarchy.register_subject(id.clone(), name, region, &parent)?;
                id
            }
        };
        Ok(hierarchy.organization(&id)?)
    }

    pub fn register_member(&self, signer: SignerIdentity, org: &OrgId) -> RegistryResult<()> {
        Ok(self.container.hierarchy.register_member(signer, org)?)
    }

    pub fn links_for_subject(&self, subject: &OrgId) -> Vec<Link> {
        self.container.hierarchy.links_for_subject(subject)
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    pub async fn reconcile_pending(
        &self,
        id: &ProjectId,
    ) -> RegistryResult<Option<TransitionOutcome>> {
        let outcome = self.container.workflow.reconcile_pending(id).await?;
        if outcome.is_some() {
            LEDGER_OUTCOMES.with_label_values(&["confirmed"]).inc();
        }
        Ok(outcome)
    }

    pub async fn reconcile_audit(&self) -> RegistryResult<usize> {
        let result = self.container.workflow.reconcile_audit().await;
        AUDIT_BACKLOG.set(self.container.workflow.backlog_len() as f64);
        Ok(result?)
    }

    /// Writes the audit backlog, then re-polls every unconfirmed transition.
    ///
    /// An audit store that is still down stops the pass; a ledger that is
    /// still silent only leaves that project pending.
    pub async fn reconcile_all(&self) -> RegistryResult<ReconcileReport> {
        let mut report = ReconcileReport {
            audit_appended: self.reconcile_audit().await?,
            ..ReconcileReport::default()
        };

        for id in self.container.workflow.projects_needing_reconciliation() {
            match self.reconcile_pending(&id).await {
                Ok(Some(_)) => report.settled.push(id),
                Ok(None) => {}
                Err(e) if e.kind == ErrorKind::LedgerReverted => report.settled.push(id),
                Err(e) if e.kind.is_retryable() => report.still_pending.push(id),
                Err(e) => {
                    warn!(project = %id, error = %e, "Reconciliation failed");
                    report.still_pending.push(id);
                }
            }
        }
        if !report.settled.is_empty() || report.audit_appended > 0 {
            info!(
                settled = report.settled.len(),
                still_pending = report.still_pending.len(),
                audit_appended = report.audit_appended,
                "Reconciliation pass complete"
            );
        }
        Ok(report)
    }

    pub fn projects_needing_reconciliation(&self) -> Vec<ProjectId> {
        self.container.workflow.projects_needing_reconciliation()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.container.bus.subscribe(filter)
    }
}
