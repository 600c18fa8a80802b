//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use shared_types::{OrgId, ProjectId, SignedAction};

use crate::domain::entities::{IssuanceCertificate, ProjectRecord, SubmitProject, TransitionOutcome};
use crate::domain::errors::WorkflowResult;

/// Project lifecycle API.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Registers a project at `Submitted` for its submitting organization.
    async fn submit_project(&self, request: SubmitProject) -> WorkflowResult<ProjectRecord>;

    /// Authorizes, anchors on the ledger, commits and audits one transition.
    ///
    /// Concurrent proposals for one project are not queued: all but one fail
    /// with `TransitionInProgress`.
    async fn propose_transition(&self, signed: SignedAction) -> WorkflowResult<TransitionOutcome>;

    fn project(&self, id: &ProjectId) -> WorkflowResult<ProjectRecord>;

    /// Projects ordered by id, optionally only those of one subject.
    fn list_projects(&self, subject: Option<&OrgId>) -> Vec<ProjectRecord>;

    /// Polls the ledger again for a timed-out transition.
    ///
    /// `Ok(None)` when nothing is awaiting confirmation.
    async fn reconcile_pending(&self, id: &ProjectId) -> WorkflowResult<Option<TransitionOutcome>>;

    /// Appends backlogged audit entries in order, returning how many.
    async fn reconcile_audit(&self) -> WorkflowResult<usize>;

    /// Projects awaiting confirmation or missing audit entries.
    fn projects_needing_reconciliation(&self) -> Vec<ProjectId>;

    /// Certificate stored when the project's credits were minted.
    async fn issuance_certificate(&self, id: &ProjectId) -> WorkflowResult<Option<IssuanceCertificate>>;
}
