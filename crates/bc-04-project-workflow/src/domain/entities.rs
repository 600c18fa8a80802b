//! # Domain Entities
//!
//! The project record and the bookkeeping around an in-flight transition.

use bc_05_ledger_orchestrator::PendingTxRef;
use serde::{Deserialize, Serialize};
use shared_types::{
    ActionType, IdempotencyKey, OrgId, ProjectId, SignedAction, SignerIdentity, Stage, Timestamp,
    SCHEMA_VERSION,
};
use std::time::Duration;

/// A restoration project and its position in the approval sequence.
///
/// Never deleted; terminal stages archive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub schema_version: u16,
    pub id: ProjectId,
    /// Submitting organization, fixed at submission.
    pub subject_org: OrgId,
    pub submitter: SignerIdentity,
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    pub stage: Stage,
    /// Opaque pointer to the project's on-chain record.
    pub ledger_ref: String,
    /// Submission metadata at first, the issuance certificate once minted.
    pub content_locator: Option<String>,
    pub credits_minted: Option<u64>,
    pub token_id: Option<u64>,
    pub rejection_reason: Option<String>,
    pub last_ledger_tx: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set while a transition is being processed.
    pub pending_transition: Option<PendingTransition>,
    /// Set when a submitted transaction outlived the confirmation timeout.
    pub awaiting_confirmation: Option<AwaitingConfirmation>,
    /// A committed outcome is missing from the audit trail.
    pub needs_reconciliation: bool,
}

impl ProjectRecord {
    pub(crate) fn new(request: &SubmitProject, content_locator: Option<String>, now: Timestamp) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            id: request.project_id.clone(),
            subject_org: request.subject.clone(),
            submitter: request.submitter.clone(),
            name: request.name.clone(),
            location: request.location.clone(),
            area_hectares: request.area_hectares,
            stage: Stage::Submitted,
            ledger_ref: format!("registry/{}", request.project_id),
            content_locator,
            credits_minted: None,
            token_id: None,
            rejection_reason: None,
            last_ledger_tx: None,
            created_at: now,
            updated_at: now,
            pending_transition: None,
            awaiting_confirmation: None,
            needs_reconciliation: false,
        }
    }
}

/// Claim on a project's single in-flight slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransition {
    pub action: ActionType,
    pub key: IdempotencyKey,
    pub started_at: Timestamp,
}

/// A submitted transition whose receipt has not arrived yet.
///
/// Holds everything needed to finish the transition later without
/// resubmitting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitingConfirmation {
    pub pending: PendingTxRef,
    /// The signed action, metadata blob stripped.
    pub action: SignedAction,
    pub from_stage: Stage,
    pub target_stage: Stage,
    /// Locator of the action's metadata blob.
    pub metadata_locator: Option<String>,
    /// Locator of the issuance certificate (finalApprove only).
    pub certificate_locator: Option<String>,
}

/// Request to register a new project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProject {
    pub project_id: ProjectId,
    pub subject: OrgId,
    /// Identity submitting on behalf of `subject`; must be one of its members.
    pub submitter: SignerIdentity,
    pub name: String,
    pub location: String,
    pub area_hectares: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<u8>>,
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub project: ProjectRecord,
    pub ledger_tx: String,
    pub audit_sequence: u64,
}

/// Document stored in the content store when credits are issued.
///
/// Built only from signed and committed data, so the same approval always
/// yields the same bytes and therefore the same locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceCertificate {
    pub schema_version: u16,
    pub project_id: ProjectId,
    pub subject_org: OrgId,
    pub ledger_ref: String,
    pub credit_amount: u64,
    pub approved_by: SignerIdentity,
    pub approval_nonce: String,
    pub approved_at: Timestamp,
    pub submission_locator: Option<String>,
}

impl IssuanceCertificate {
    pub fn for_approval(project: &ProjectRecord, approval: &SignedAction, credit_amount: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            project_id: project.id.clone(),
            subject_org: project.subject_org.clone(),
            ledger_ref: project.ledger_ref.clone(),
            credit_amount,
            approved_by: approval.signer.clone(),
            approval_nonce: approval.nonce.to_string(),
            approved_at: approval.timestamp,
            submission_locator: project.content_locator.clone(),
        }
    }
}

/// Workflow tuning.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// How long one proposal waits for a ledger receipt.
    pub confirmation_timeout: Duration,
    /// Bound on each content-store call.
    pub content_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
            content_timeout: Duration::from_secs(10),
        }
    }
}
