//! # Hierarchy Tree
//!
//! Pure tree logic: registration, link management and entitlement checks.
//! No locking and no clock; the service supplies both.
//!
//! ## Shape
//!
//! ```text
//!                 National authority (root)
//!                 ├── Regional authority (region R)
//!                 │     └── Subject (region R)      <- unassigned
//!                 └── Verifier
//!                       └── Subject (region R)      <- re-parented on assignment
//! ```
//!
//! Subjects never have children, so re-parenting a subject cannot form a cycle.

use serde::Serialize;
use std::collections::HashMap;

use shared_types::{
    ActionType, LinkId, OrgId, RegionCode, RequiredRole, Role, SignerIdentity, Timestamp,
    SCHEMA_VERSION,
};

use super::entities::{
    AssignMode, AuthorityScope, Link, LinkStatus, OrgKind, Organization, Permissions,
};
use super::errors::{HierarchyError, HierarchyResult};

/// Organization and link tables.
#[derive(Debug, Default)]
pub struct HierarchyState {
    orgs: HashMap<OrgId, Organization>,
    links: HashMap<LinkId, Link>,
    /// Link history per subject, oldest first.
    subject_links: HashMap<OrgId, Vec<LinkId>>,
    members: HashMap<SignerIdentity, OrgId>,
    root: Option<OrgId>,
    next_link: u64,
}

impl HierarchyState {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    pub fn register_root_authority(&mut self, id: OrgId, name: String) -> HierarchyResult<()> {
        if let Some(root) = &self.root {
            return Err(HierarchyError::InvalidHierarchy(format!(
                "root authority {root} already registered"
            )));
        }
        self.ensure_unused(&id)?;
        let org = Organization::new(
            id.clone(),
            OrgKind::Authority,
            name,
            None,
            Some(AuthorityScope::National),
            None,
        );
        self.orgs.insert(id.clone(), org);
        self.root = Some(id);
        Ok(())
    }

    pub fn register_local_authority(
        &mut self,
        id: OrgId,
        name: String,
        region: RegionCode,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.ensure_unused(&id)?;
        let parent_org = self.org(parent)?;
        if !parent_org.is_national_authority() {
            return Err(HierarchyError::InvalidHierarchy(format!(
                "local authority {id} must sit under the national authority"
            )));
        }
        let org = Organization::new(
            id,
            OrgKind::Authority,
            name,
            Some(region.clone()),
            Some(AuthorityScope::Regional(region)),
            Some(parent.clone()),
        );
        self.attach(org);
        Ok(())
    }

    pub fn register_verifier(
        &mut self,
        id: OrgId,
        name: String,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.ensure_unused(&id)?;
        self.require_kind(parent, OrgKind::Authority)?;
        let org = Organization::new(id, OrgKind::Verifier, name, None, None, Some(parent.clone()));
        self.attach(org);
        Ok(())
    }

    pub fn register_subject(
        &mut self,
        id: OrgId,
        name: String,
        region: RegionCode,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.ensure_unused(&id)?;
        let parent_org = self.require_kind(parent, OrgKind::Authority)?;
        if let Some(parent_region) = parent_org.authority_region() {
            if parent_region != &region {
                return Err(HierarchyError::InvalidHierarchy(format!(
                    "subject {id} in region {region} cannot sit under authority for {parent_region}"
                )));
            }
        }
        let org = Organization::new(
            id,
            OrgKind::Subject,
            name,
            Some(region),
            None,
            Some(parent.clone()),
        );
        self.attach(org);
        Ok(())
    }

    /// Binds a signer identity to exactly one organization.
    pub fn register_member(&mut self, signer: SignerIdentity, org: &OrgId) -> HierarchyResult<()> {
        self.org(org)?;
        if self.members.contains_key(&signer) {
            return Err(HierarchyError::SignerAlreadyRegistered(signer.to_string()));
        }
        self.members.insert(signer, org.clone());
        Ok(())
    }

    fn ensure_unused(&self, id: &OrgId) -> HierarchyResult<()> {
        if self.orgs.contains_key(id) {
            return Err(HierarchyError::InvalidHierarchy(format!(
                "organization {id} already registered"
            )));
        }
        Ok(())
    }

    fn attach(&mut self, org: Organization) {
        if let Some(parent) = org.parent.as_ref().and_then(|p| self.orgs.get_mut(p)) {
            parent.children.insert(org.id.clone());
        }
        self.orgs.insert(org.id.clone(), org);
    }

    fn reparent(&mut self, child: &OrgId, new_parent: &OrgId) {
        let old_parent = self.orgs.get(child).and_then(|o| o.parent.clone());
        if let Some(old) = old_parent.and_then(|p| self.orgs.get_mut(&p)) {
            old.children.remove(child);
        }
        if let Some(parent) = self.orgs.get_mut(new_parent) {
            parent.children.insert(child.clone());
        }
        if let Some(org) = self.orgs.get_mut(child) {
            org.parent = Some(new_parent.clone());
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn org(&self, id: &OrgId) -> HierarchyResult<&Organization> {
        self.orgs
            .get(id)
            .ok_or_else(|| HierarchyError::UnknownOrganization(id.clone()))
    }

    fn require_kind(&self, id: &OrgId, kind: OrgKind) -> HierarchyResult<&Organization> {
        let org = self.org(id)?;
        if org.kind != kind {
            return Err(HierarchyError::InvalidHierarchy(format!(
                "organization {id} is a {:?}, expected {kind:?}",
                org.kind
            )));
        }
        Ok(org)
    }

    pub fn link(&self, id: &LinkId) -> HierarchyResult<&Link> {
        self.links
            .get(id)
            .ok_or_else(|| HierarchyError::UnknownLink(id.clone()))
    }

    pub fn links_for_subject(&self, subject: &OrgId) -> Vec<Link> {
        self.subject_links
            .get(subject)
            .map(|ids| ids.iter().filter_map(|id| self.links.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    fn active_link(&self, subject: &OrgId) -> Option<&Link> {
        self.subject_links
            .get(subject)?
            .iter()
            .filter_map(|id| self.links.get(id))
            .find(|link| link.is_active())
    }

    pub fn resolve_verifier(&self, subject: &OrgId) -> HierarchyResult<OrgId> {
        self.require_kind(subject, OrgKind::Subject)?;
        self.active_link(subject)
            .map(|link| link.verifier.clone())
            .ok_or_else(|| HierarchyError::NotLinked {
                subject: subject.clone(),
            })
    }

    /// True if `org` sits strictly below `authority`.
    pub fn is_descendant(&self, authority: &OrgId, org: &OrgId) -> bool {
        let mut current = self.orgs.get(org).and_then(|o| o.parent.as_ref());
        // depth is bounded by the org count since the tree has no cycles
        let mut steps = 0usize;
        while let Some(parent) = current {
            if parent == authority {
                return true;
            }
            steps += 1;
            if steps > self.orgs.len() {
                return false;
            }
            current = self.orgs.get(parent).and_then(|o| o.parent.as_ref());
        }
        false
    }

    pub fn organization_of(&self, signer: &SignerIdentity) -> Option<&OrgId> {
        self.members.get(signer)
    }

    pub fn role_of(&self, signer: &SignerIdentity) -> Option<Role> {
        let org = self.orgs.get(self.members.get(signer)?)?;
        Some(role_for(org))
    }

    // =========================================================================
    // LINK MANAGEMENT
    // =========================================================================

    /// Resolves the acting authority, restricted to `subject`'s region when
    /// the authority is regional.
    fn acting_authority(
        &self,
        by: &SignerIdentity,
        subject: &Organization,
    ) -> HierarchyResult<&Organization> {
        let held = self.role_of(by);
        let org = self
            .members
            .get(by)
            .and_then(|id| self.orgs.get(id))
            .filter(|org| org.kind == OrgKind::Authority)
            .ok_or(HierarchyError::NotAuthority {
                required: RequiredRole::Authority,
                held: held.clone(),
            })?;
        if let Some(region) = org.authority_region() {
            if subject.region.as_ref() != Some(region) {
                return Err(HierarchyError::NotAuthority {
                    required: subject
                        .region
                        .clone()
                        .map(RequiredRole::LocalAuthority)
                        .unwrap_or(RequiredRole::NationalAuthority),
                    held,
                });
            }
        }
        Ok(org)
    }

    pub fn assign_subject(
        &mut self,
        by: &SignerIdentity,
        subject: &OrgId,
        verifier: &OrgId,
        permissions: Permissions,
        mode: AssignMode,
        now: Timestamp,
    ) -> HierarchyResult<AssignOutcome> {
        let subject_org = self.require_kind(subject, OrgKind::Subject)?;
        self.acting_authority(by, subject_org)?;
        self.require_kind(verifier, OrgKind::Verifier)?;

        let mut replaced = None;
        if let Some(existing) = self.active_link(subject) {
            if existing.verifier == *verifier || mode == AssignMode::New {
                return Err(HierarchyError::AlreadyLinked {
                    subject: subject.clone(),
                    verifier: existing.verifier.clone(),
                });
            }
            replaced = Some(existing.id.clone());
        }

        if let Some(old_id) = &replaced {
            if let Some(old) = self.links.get_mut(old_id) {
                old.status = LinkStatus::Revoked;
                old.revoked_by = Some(by.clone());
                old.revoked_at = Some(now);
            }
        }

        self.next_link += 1;
        let id = LinkId::parse(format!("link-{:06}", self.next_link))?;
        let link = Link {
            schema_version: SCHEMA_VERSION,
            id: id.clone(),
            verifier: verifier.clone(),
            subject: subject.clone(),
            status: LinkStatus::Active,
            assigned_by: by.clone(),
            assigned_at: now,
            revoked_by: None,
            revoked_at: None,
            permissions,
        };
        self.links.insert(id.clone(), link.clone());
        self.subject_links
            .entry(subject.clone())
            .or_default()
            .push(id);
        self.reparent(subject, verifier);

        Ok(AssignOutcome { link, replaced })
    }

    pub fn revoke_link(
        &mut self,
        id: &LinkId,
        by: &SignerIdentity,
        now: Timestamp,
    ) -> HierarchyResult<Link> {
        let link = self.link(id)?;
        if !link.is_active() {
            return Err(HierarchyError::LinkNotActive(id.clone()));
        }
        let subject = link.subject.clone();
        let subject_org = self.org(&subject)?;
        let authority = self.acting_authority(by, subject_org)?.id.clone();

        let revoked = match self.links.get_mut(id) {
            Some(link) => {
                link.status = LinkStatus::Revoked;
                link.revoked_by = Some(by.clone());
                link.revoked_at = Some(now);
                link.clone()
            }
            None => return Err(HierarchyError::UnknownLink(id.clone())),
        };
        self.reparent(&subject, &authority);
        Ok(revoked)
    }

    // =========================================================================
    // ENTITLEMENT
    // =========================================================================

    /// Checks that `signer` may perform `action` on a project owned by
    /// `subject`, returning the role it acts under.
    pub fn entitlement(
        &self,
        signer: &SignerIdentity,
        subject: &OrgId,
        action: ActionType,
    ) -> HierarchyResult<Role> {
        let subject_org = self.require_kind(subject, OrgKind::Subject)?;
        let region = subject_org.region.clone().ok_or_else(|| {
            HierarchyError::InvalidHierarchy(format!("subject {subject} has no region"))
        })?;
        let signer_org = self.members.get(signer).and_then(|id| self.orgs.get(id));
        let held = signer_org.map(role_for);

        let linked_verifier = || {
            self.active_link(subject)
                .filter(|link| Some(&link.verifier) == signer_org.map(|o| &o.id))
        };

        match action {
            ActionType::Verify => {
                if held != Some(Role::Verifier) {
                    return Err(HierarchyError::NotAuthority {
                        required: RequiredRole::LinkedVerifier,
                        held,
                    });
                }
                let link = linked_verifier().ok_or_else(|| HierarchyError::NotLinked {
                    subject: subject.clone(),
                })?;
                if !link.permissions.may_verify_data {
                    return Err(HierarchyError::NotAuthority {
                        required: RequiredRole::LinkedVerifier,
                        held,
                    });
                }
                Ok(Role::Verifier)
            }
            ActionType::LocalApprove => match held {
                Some(Role::LocalAuthority(r)) if r == region => Ok(Role::LocalAuthority(r)),
                held => Err(HierarchyError::NotAuthority {
                    required: RequiredRole::LocalAuthority(region),
                    held,
                }),
            },
            ActionType::FinalApprove => match (held, signer_org) {
                (Some(Role::NationalAuthority), Some(org)) if self.is_descendant(&org.id, subject) => {
                    Ok(Role::NationalAuthority)
                }
                (held, _) => Err(HierarchyError::NotAuthority {
                    required: RequiredRole::NationalAuthority,
                    held,
                }),
            },
            ActionType::Reject => match held {
                Some(Role::NationalAuthority) => Ok(Role::NationalAuthority),
                Some(Role::LocalAuthority(r)) if r == region => Ok(Role::LocalAuthority(r)),
                Some(Role::Verifier) if linked_verifier().is_some() => Ok(Role::Verifier),
                held => Err(HierarchyError::NotAuthority {
                    required: RequiredRole::ProjectOverseer,
                    held,
                }),
            },
        }
    }
}

/// Result of a successful assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOutcome {
    pub link: Link,
    /// Link revoked by an explicit replacement.
    pub replaced: Option<LinkId>,
}

fn role_for(org: &Organization) -> Role {
    match (&org.kind, &org.authority_scope) {
        (OrgKind::Authority, Some(AuthorityScope::Regional(region))) => {
            Role::LocalAuthority(region.clone())
        }
        (OrgKind::Authority, _) => Role::NationalAuthority,
        (OrgKind::Verifier, _) => Role::Verifier,
        (OrgKind::Subject, _) => Role::Subject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(id: &str) -> OrgId {
        OrgId::parse(id).unwrap()
    }

    fn signer(n: u8) -> SignerIdentity {
        SignerIdentity::from_address([n; 20])
    }

    fn region(code: &str) -> RegionCode {
        RegionCode::parse(code).unwrap()
    }

    /// NCCR (national) -> PANCH-KL (regional) ; NGO-1, NGO-2 verifiers ;
    /// S1 subject in KL. Members: N1=1, L1=2, V1=3, V2=4, S1=5, L2=6 (TN).
    fn fixture() -> HierarchyState {
        let mut state = HierarchyState::new();
        state.register_root_authority(org("NCCR"), "NCCR".into()).unwrap();
        state
            .register_local_authority(org("PANCH-KL"), "Panchayat KL".into(), region("KL"), &org("NCCR"))
            .unwrap();
        state
            .register_local_authority(org("PANCH-TN"), "Panchayat TN".into(), region("TN"), &org("NCCR"))
            .unwrap();
        state.register_verifier(org("NGO-1"), "NGO 1".into(), &org("NCCR")).unwrap();
        state.register_verifier(org("NGO-2"), "NGO 2".into(), &org("NCCR")).unwrap();
        state
            .register_subject(org("S1"), "Community 1".into(), region("KL"), &org("PANCH-KL"))
            .unwrap();
        state.register_member(signer(1), &org("NCCR")).unwrap();
        state.register_member(signer(2), &org("PANCH-KL")).unwrap();
        state.register_member(signer(3), &org("NGO-1")).unwrap();
        state.register_member(signer(4), &org("NGO-2")).unwrap();
        state.register_member(signer(5), &org("S1")).unwrap();
        state.register_member(signer(6), &org("PANCH-TN")).unwrap();
        state
    }

    fn assign(state: &mut HierarchyState, verifier: &str, mode: AssignMode) -> HierarchyResult<AssignOutcome> {
        state.assign_subject(&signer(1), &org("S1"), &org(verifier), Permissions::default(), mode, 100)
    }

    #[test]
    fn test_single_root() {
        let mut state = fixture();
        let err = state.register_root_authority(org("OTHER"), "x".into()).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_parent_kind_enforced() {
        let mut state = fixture();
        let err = state
            .register_subject(org("S2"), "x".into(), region("KL"), &org("NGO-1"))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidHierarchy(_)));
        let err = state
            .register_local_authority(org("PANCH-X"), "x".into(), region("X"), &org("PANCH-KL"))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidHierarchy(_)));
        let err = state
            .register_subject(org("S3"), "x".into(), region("TN"), &org("PANCH-KL"))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_one_org_per_signer() {
        let mut state = fixture();
        let err = state.register_member(signer(1), &org("NGO-1")).unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::InvalidAction);
    }

    #[test]
    fn test_assign_reparents_subject() {
        let mut state = fixture();
        let outcome = assign(&mut state, "NGO-1", AssignMode::New).unwrap();
        assert!(outcome.replaced.is_none());
        assert_eq!(state.resolve_verifier(&org("S1")).unwrap(), org("NGO-1"));
        assert_eq!(state.org(&org("S1")).unwrap().parent, Some(org("NGO-1")));
        assert!(state.org(&org("NGO-1")).unwrap().children.contains(&org("S1")));
        assert!(!state.org(&org("PANCH-KL")).unwrap().children.contains(&org("S1")));
        assert!(state.is_descendant(&org("NCCR"), &org("S1")));
        assert!(state.is_descendant(&org("NGO-1"), &org("S1")));
        assert!(!state.is_descendant(&org("S1"), &org("NCCR")));
    }

    #[test]
    fn test_assign_requires_authority() {
        let mut state = fixture();
        let err = state
            .assign_subject(&signer(3), &org("S1"), &org("NGO-1"), Permissions::default(), AssignMode::New, 1)
            .unwrap_err();
        assert_eq!(
            err,
            HierarchyError::NotAuthority {
                required: RequiredRole::Authority,
                held: Some(Role::Verifier)
            }
        );
    }

    #[test]
    fn test_regional_authority_limited_to_region() {
        let mut state = fixture();
        let err = state
            .assign_subject(&signer(6), &org("S1"), &org("NGO-1"), Permissions::default(), AssignMode::New, 1)
            .unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::NotAuthority);
        assert!(state
            .assign_subject(&signer(2), &org("S1"), &org("NGO-1"), Permissions::default(), AssignMode::New, 1)
            .is_ok());
    }

    #[test]
    fn test_at_most_one_active_link() {
        let mut state = fixture();
        assign(&mut state, "NGO-1", AssignMode::New).unwrap();

        let err = assign(&mut state, "NGO-2", AssignMode::New).unwrap_err();
        assert!(matches!(err, HierarchyError::AlreadyLinked { .. }));
        let err = assign(&mut state, "NGO-1", AssignMode::Replace).unwrap_err();
        assert!(matches!(err, HierarchyError::AlreadyLinked { .. }));

        let outcome = assign(&mut state, "NGO-2", AssignMode::Replace).unwrap();
        assert!(outcome.replaced.is_some());
        let history = state.links_for_subject(&org("S1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|l| l.is_active()).count(), 1);
        assert_eq!(history[0].status, LinkStatus::Revoked);
        assert_eq!(state.resolve_verifier(&org("S1")).unwrap(), org("NGO-2"));
        assert!(!state.org(&org("NGO-1")).unwrap().children.contains(&org("S1")));
    }

    #[test]
    fn test_revoke_makes_subject_unlinked() {
        let mut state = fixture();
        let link = assign(&mut state, "NGO-1", AssignMode::New).unwrap().link;
        state.revoke_link(&link.id, &signer(2), 200).unwrap();

        assert!(matches!(
            state.resolve_verifier(&org("S1")),
            Err(HierarchyError::NotLinked { .. })
        ));
        assert_eq!(state.org(&org("S1")).unwrap().parent, Some(org("PANCH-KL")));
        assert!(matches!(
            state.entitlement(&signer(3), &org("S1"), ActionType::Verify),
            Err(HierarchyError::NotLinked { .. })
        ));
        assert!(matches!(
            state.revoke_link(&link.id, &signer(1), 300),
            Err(HierarchyError::LinkNotActive(_))
        ));
        let stored = state.link(&link.id).unwrap();
        assert_eq!(stored.revoked_at, Some(200));
        assert_eq!(stored.revoked_by, Some(signer(2)));
    }

    #[test]
    fn test_entitlement_table() {
        let mut state = fixture();
        assign(&mut state, "NGO-1", AssignMode::New).unwrap();
        let s1 = org("S1");

        assert_eq!(state.entitlement(&signer(3), &s1, ActionType::Verify).unwrap(), Role::Verifier);
        assert!(matches!(
            state.entitlement(&signer(4), &s1, ActionType::Verify),
            Err(HierarchyError::NotLinked { .. })
        ));
        assert!(matches!(
            state.entitlement(&signer(2), &s1, ActionType::Verify),
            Err(HierarchyError::NotAuthority { required: RequiredRole::LinkedVerifier, .. })
        ));

        assert_eq!(
            state.entitlement(&signer(2), &s1, ActionType::LocalApprove).unwrap(),
            Role::LocalAuthority(region("KL"))
        );
        let err = state.entitlement(&signer(6), &s1, ActionType::LocalApprove).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::NotAuthority {
                required: RequiredRole::LocalAuthority(region("KL")),
                held: Some(Role::LocalAuthority(region("TN")))
            }
        );

        assert_eq!(
            state.entitlement(&signer(1), &s1, ActionType::FinalApprove).unwrap(),
            Role::NationalAuthority
        );
        assert!(state.entitlement(&signer(2), &s1, ActionType::FinalApprove).is_err());

        for who in [1, 2, 3] {
            assert!(state.entitlement(&signer(who), &s1, ActionType::Reject).is_ok());
        }
        for who in [4, 5, 6, 9] {
            assert!(state.entitlement(&signer(who), &s1, ActionType::Reject).is_err());
        }
    }

    #[test]
    fn test_link_permissions_gate_verification() {
        let mut state = fixture();
        let permissions = Permissions {
            may_verify_data: false,
            ..Permissions::default()
        };
        state
            .assign_subject(&signer(1), &org("S1"), &org("NGO-1"), permissions, AssignMode::New, 1)
            .unwrap();
        assert!(matches!(
            state.entitlement(&signer(3), &org("S1"), ActionType::Verify),
            Err(HierarchyError::NotAuthority { .. })
        ));
    }
}
