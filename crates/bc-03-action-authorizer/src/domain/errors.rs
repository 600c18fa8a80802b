//! # Domain Errors
//!
//! Every rejection carries enough detail to explain itself: the role or
//! stage that would have been required, and what the signer or project had.

use bc_01_hierarchy::HierarchyError;
use bc_02_signature_codec::CodecError;
use shared_types::{ErrorKind, Nonce, SignerIdentity, Stage, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    /// The presented message is not the canonical message for the action.
    #[error("signed message does not match the canonical message for this action")]
    MessageMismatch,

    #[error("signature recovers to {recovered}, not the claimed signer {claimed}")]
    SignerMismatch {
        claimed: SignerIdentity,
        recovered: SignerIdentity,
    },

    #[error("nonce {nonce} already used by {signer}")]
    NonceReused { signer: SignerIdentity, nonce: Nonce },

    #[error("timestamp {timestamp} outside freshness window at {now} (max age {max_age_ms} ms)")]
    StaleTimestamp {
        timestamp: Timestamp,
        now: Timestamp,
        max_age_ms: u64,
    },

    #[error("project is already final at stage {stage}")]
    AlreadyFinal { stage: Stage },

    #[error("action requires stage {required}; project is at {current}")]
    WrongStage { current: Stage, required: Stage },

    #[error(transparent)]
    Signature(#[from] CodecError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

impl AuthorizationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthorizationError::InvalidAction(_) => ErrorKind::InvalidAction,
            AuthorizationError::InvalidSignatureFormat(_) | AuthorizationError::MessageMismatch => {
                ErrorKind::InvalidSignatureFormat
            }
            AuthorizationError::SignerMismatch { .. } => ErrorKind::SignerMismatch,
            AuthorizationError::NonceReused { .. } => ErrorKind::NonceReused,
            AuthorizationError::StaleTimestamp { .. } => ErrorKind::StaleTimestamp,
            AuthorizationError::AlreadyFinal { .. } => ErrorKind::AlreadyFinal,
            AuthorizationError::WrongStage { .. } => ErrorKind::WrongStage,
            AuthorizationError::Signature(e) => e.kind(),
            AuthorizationError::Hierarchy(e) => e.kind(),
        }
    }
}

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{OrgId, RequiredRole, Role};

    #[test]
    fn test_not_authority_explains_roles() {
        let err = AuthorizationError::from(HierarchyError::NotAuthority {
            required: RequiredRole::LocalAuthority(shared_types::RegionCode::parse("KL").unwrap()),
            held: Some(Role::Verifier),
        });
        assert_eq!(err.kind(), ErrorKind::NotAuthority);
        assert_eq!(
            err.to_string(),
            "action requires local-authority role for region KL; signer holds verifier role"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(AuthorizationError::MessageMismatch.kind(), ErrorKind::InvalidSignatureFormat);
        assert_eq!(
            AuthorizationError::from(CodecError::MalleableSignature).kind(),
            ErrorKind::InvalidSignatureFormat
        );
        assert_eq!(
            AuthorizationError::from(HierarchyError::NotLinked {
                subject: OrgId::parse("S1").unwrap()
            })
            .kind(),
            ErrorKind::NotLinked
        );
        let wrong = AuthorizationError::WrongStage {
            current: Stage::Submitted,
            required: Stage::NgoVerified,
        };
        assert_eq!(wrong.kind(), ErrorKind::WrongStage);
        assert_eq!(
            wrong.to_string(),
            "action requires stage NGOVerified; project is at Submitted"
        );
    }
}
