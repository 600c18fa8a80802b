//! # Domain Errors

use shared_types::{ErrorKind, IdentifierError, LinkId, OrgId, RequiredRole, Role};
use thiserror::Error;

/// Hierarchy error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Signer lacks the role the operation requires.
    #[error("action requires {required}; signer holds {} role", held_role(.held))]
    NotAuthority {
        required: RequiredRole,
        held: Option<Role>,
    },

    /// Subject already has an active link that is not being replaced.
    #[error("subject {subject} already linked to verifier {verifier}")]
    AlreadyLinked { subject: OrgId, verifier: OrgId },

    /// No active link between the subject and the acting verifier.
    #[error("subject {subject} has no active link for this verifier")]
    NotLinked { subject: OrgId },

    #[error("unknown organization: {0}")]
    UnknownOrganization(OrgId),

    #[error("unknown link: {0}")]
    UnknownLink(LinkId),

    #[error("link {0} is already revoked")]
    LinkNotActive(LinkId),

    /// Registration would break the tree shape.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("signer {0} is already a member of an organization")]
    SignerAlreadyRegistered(String),

    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
}

fn held_role(held: &Option<Role>) -> String {
    match held {
        Some(role) => role.to_string(),
        None => "no".to_string(),
    }
}

impl HierarchyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HierarchyError::NotAuthority { .. } => ErrorKind::NotAuthority,
            HierarchyError::AlreadyLinked { .. } => ErrorKind::AlreadyLinked,
            HierarchyError::NotLinked { .. }
            | HierarchyError::UnknownLink(_)
            | HierarchyError::LinkNotActive(_) => ErrorKind::NotLinked,
            HierarchyError::UnknownOrganization(_) => ErrorKind::UnknownOrganization,
            HierarchyError::InvalidHierarchy(_)
            | HierarchyError::SignerAlreadyRegistered(_)
            | HierarchyError::InvalidIdentifier(_) => ErrorKind::InvalidAction,
        }
    }
}

/// Result type for hierarchy operations.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::RegionCode;

    #[test]
    fn test_not_authority_message_names_both_roles() {
        let err = HierarchyError::NotAuthority {
            required: RequiredRole::LocalAuthority(RegionCode::parse("KL").unwrap()),
            held: Some(Role::Verifier),
        };
        assert_eq!(
            err.to_string(),
            "action requires local-authority role for region KL; signer holds verifier role"
        );
        assert_eq!(err.kind(), ErrorKind::NotAuthority);
    }

    #[test]
    fn test_not_authority_without_membership() {
        let err = HierarchyError::NotAuthority {
            required: RequiredRole::NationalAuthority,
            held: None,
        };
        assert!(err.to_string().ends_with("signer holds no role"));
    }
}
