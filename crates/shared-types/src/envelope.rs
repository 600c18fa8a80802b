//! # `SignedAction` Envelope
//!
//! The wrapper for every stage-transition request.
//!
//! ## Security Properties
//!
//! - **Bounded Fields**: each action type carries a fixed, recognised field
//!   set. Free-form detail travels as one opaque metadata blob whose digest
//!   is bound into the signed message.
//! - **Replay Prevention**: `(signer, nonce)` is never reused.
//! - **Idempotency**: the idempotency key is derived from `(signer, nonce)`,
//!   so a retried request maps to the same ledger submission.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::clock::Timestamp;
use crate::entities::{ActionType, Nonce, ProjectId, SignerIdentity};

/// A requested stage transition with the fields recognised for its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ProposedAction {
    #[serde(rename_all = "camelCase")]
    Verify { project_id: ProjectId },
    #[serde(rename_all = "camelCase")]
    LocalApprove { project_id: ProjectId },
    #[serde(rename_all = "camelCase")]
    FinalApprove {
        project_id: ProjectId,
        credit_amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    Reject { project_id: ProjectId, reason: String },
}

impl ProposedAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            ProposedAction::Verify { .. } => ActionType::Verify,
            ProposedAction::LocalApprove { .. } => ActionType::LocalApprove,
            ProposedAction::FinalApprove { .. } => ActionType::FinalApprove,
            ProposedAction::Reject { .. } => ActionType::Reject,
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        match self {
            ProposedAction::Verify { project_id }
            | ProposedAction::LocalApprove { project_id }
            | ProposedAction::FinalApprove { project_id, .. }
            | ProposedAction::Reject { project_id, .. } => project_id,
        }
    }

    pub fn credit_amount(&self) -> Option<u64> {
        match self {
            ProposedAction::FinalApprove { credit_amount, .. } => Some(*credit_amount),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ProposedAction::Reject { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A proposed action together with its signature over the canonical message.
///
/// Immutable once recorded. Produced by the caller's signer and only
/// referenced by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAction {
    pub action: ProposedAction,
    pub signer: SignerIdentity,
    pub timestamp: Timestamp,
    pub nonce: Nonce,
    /// The exact text that was signed.
    pub canonical_message: String,
    /// `0x`-prefixed 65-byte recoverable signature.
    pub signature: String,
    /// Opaque detail blob, routed to the content store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<u8>>,
}

impl SignedAction {
    pub fn project_id(&self) -> &ProjectId {
        self.action.project_id()
    }

    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::derive(&self.signer, &self.nonce)
    }

    /// Hex SHA-256 of the metadata blob, as bound into the signed message.
    pub fn metadata_digest(&self) -> Option<String> {
        self.metadata
            .as_deref()
            .map(|blob| hex::encode(Sha256::digest(blob)))
    }

    /// Digest over every signed field, used to tell a genuine retry from a
    /// different payload reusing a nonce.
    pub fn payload_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_message.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.signature.to_ascii_lowercase().as_bytes());
        hasher.finalize().into()
    }

    /// Copy without the metadata blob, for records that keep only its locator.
    pub fn without_metadata(&self) -> SignedAction {
        SignedAction {
            metadata: None,
            ..self.clone()
        }
    }
}

/// Stable key derived from `(signer, nonce)` that deduplicates ledger
/// submissions across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(signer: &SignerIdentity, nonce: &Nonce) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(signer.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(nonce.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SignerIdentity {
        SignerIdentity::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    fn signed(action: ProposedAction, nonce: &str) -> SignedAction {
        SignedAction {
            action,
            signer: signer(),
            timestamp: 1_700_000_000_000,
            nonce: Nonce::parse(nonce).unwrap(),
            canonical_message: "msg".into(),
            signature: "0xsig".into(),
            metadata: None,
        }
    }

    #[test]
    fn test_idempotency_key_is_stable_per_signer_nonce() {
        let pid = ProjectId::parse("P1").unwrap();
        let a = signed(ProposedAction::Verify { project_id: pid.clone() }, "nonce-0001");
        let b = signed(
            ProposedAction::Reject {
                project_id: pid,
                reason: "duplicate".into(),
            },
            "nonce-0001",
        );
        assert_eq!(a.idempotency_key(), b.idempotency_key());

        let c = signed(
            ProposedAction::Verify {
                project_id: ProjectId::parse("P1").unwrap(),
            },
            "nonce-0002",
        );
        assert_ne!(a.idempotency_key(), c.idempotency_key());
        assert_eq!(a.idempotency_key().as_str().len(), 64);
    }

    #[test]
    fn test_proposed_action_wire_shape() {
        let action = ProposedAction::FinalApprove {
            project_id: ProjectId::parse("P1").unwrap(),
            credit_amount: 1000,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "finalApprove");
        assert_eq!(json["projectId"], "P1");
        assert_eq!(json["creditAmount"], 1000);
        assert_eq!(action.action_type(), ActionType::FinalApprove);
        assert_eq!(action.credit_amount(), Some(1000));
    }

    #[test]
    fn test_metadata_digest() {
        let mut action = signed(
            ProposedAction::Verify {
                project_id: ProjectId::parse("P1").unwrap(),
            },
            "nonce-0001",
        );
        assert_eq!(action.metadata_digest(), None);
        action.metadata = Some(b"survey".to_vec());
        assert_eq!(action.metadata_digest().unwrap().len(), 64);
        assert!(action.without_metadata().metadata.is_none());
    }
}
