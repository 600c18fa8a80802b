//! # Inbound Ports (Driving Ports / API)

use crate::domain::entities::{AssignMode, Link, Organization, Permissions};
use crate::domain::errors::HierarchyResult;
use crate::domain::tree::AssignOutcome;
use shared_types::{ActionType, LinkId, OrgId, Role, SignerIdentity};

/// Hierarchy API consumed by the authorizer, the workflow and the caller
/// surface.
///
/// Implementations must be thread-safe (`Send + Sync`). Reads may run
/// concurrently; link writes are serialized.
pub trait HierarchyApi: Send + Sync {
    /// Verifier actively linked to `subject`, or `NotLinked`.
    fn resolve_verifier(&self, subject: &OrgId) -> HierarchyResult<OrgId>;

    /// True if `org` sits strictly below `authority` in the tree.
    fn is_descendant(&self, authority: &OrgId, org: &OrgId) -> bool;

    /// Role under which `signer` may perform `action` on `subject`'s project.
    fn entitlement(
        &self,
        signer: &SignerIdentity,
        subject: &OrgId,
        action: ActionType,
    ) -> HierarchyResult<Role>;

    fn role_of(&self, signer: &SignerIdentity) -> Option<Role>;

    fn organization_of(&self, signer: &SignerIdentity) -> Option<OrgId>;

    fn organization(&self, id: &OrgId) -> HierarchyResult<Organization>;

    fn link(&self, id: &LinkId) -> HierarchyResult<Link>;

    /// Full link history for `subject`, oldest first.
    fn links_for_subject(&self, subject: &OrgId) -> Vec<Link>;

    /// Assigns `subject` to `verifier`, acting as the authority `by`.
    fn assign_subject(
        &self,
        by: &SignerIdentity,
        subject: &OrgId,
        verifier: &OrgId,
        permissions: Permissions,
        mode: AssignMode,
    ) -> HierarchyResult<AssignOutcome>;

    /// Revokes an active link, acting as the authority `by`.
    fn revoke_link(&self, id: &LinkId, by: &SignerIdentity) -> HierarchyResult<Link>;
}
