//! # Hierarchy Store
//!
//! Application service wrapping the pure tree in a single reader/writer lock.
//!
//! Authorization checks take the read lock and run concurrently. Assignment
//! and revocation take the write lock, so two racing "assign subject X"
//! calls can never both observe "no active link".

use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{
    ActionType, LinkId, OrgId, RegionCode, Role, SignerIdentity, SystemTimeSource, TimeSource,
};
use tracing::{debug, info, warn};

use crate::domain::entities::{AssignMode, Link, Organization, Permissions};
use crate::domain::errors::HierarchyResult;
use crate::domain::tree::{AssignOutcome, HierarchyState};
use crate::ports::inbound::HierarchyApi;

pub struct HierarchyStore {
    state: RwLock<HierarchyState>,
    time_source: Arc<dyn TimeSource>,
}

impl HierarchyStore {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            state: RwLock::new(HierarchyState::new()),
            time_source,
        }
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    pub fn register_root_authority(&self, id: OrgId, name: impl Into<String>) -> HierarchyResult<()> {
        self.state.write().register_root_authority(id.clone(), name.into())?;
        info!(org_id = %id, "[bc-01] Registered national authority");
        Ok(())
    }

    pub fn register_local_authority(
        &self,
        id: OrgId,
        name: impl Into<String>,
        region: RegionCode,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.state
            .write()
            .register_local_authority(id.clone(), name.into(), region.clone(), parent)?;
        info!(org_id = %id, region = %region, "[bc-01] Registered local authority");
        Ok(())
    }

    pub fn register_verifier(
        &self,
        id: OrgId,
        name: impl Into<String>,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.state
            .write()
            .register_verifier(id.clone(), name.into(), parent)?;
        info!(org_id = %id, parent = %parent, "[bc-01] Registered verifier");
        Ok(())
    }

    pub fn register_subject(
        &self,
        id: OrgId,
        name: impl Into<String>,
        region: RegionCode,
        parent: &OrgId,
    ) -> HierarchyResult<()> {
        self.state
            .write()
            .register_subject(id.clone(), name.into(), region.clone(), parent)?;
        info!(org_id = %id, region = %region, "[bc-01] Registered subject");
        Ok(())
    }

    pub fn register_member(&self, signer: SignerIdentity, org: &OrgId) -> HierarchyResult<()> {
        self.state.write().register_member(signer.clone(), org)?;
        debug!(signer = %signer, org_id = %org, "[bc-01] Registered member");
        Ok(())
    }
}

impl Default for HierarchyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyApi for HierarchyStore {
    fn resolve_verifier(&self, subject: &OrgId) -> HierarchyResult<OrgId> {
        self.state.read().resolve_verifier(subject)
    }

    fn is_descendant(&self, authority: &OrgId, org: &OrgId) -> bool {
        self.state.read().is_descendant(authority, org)
    }

    fn entitlement(
        &self,
        signer: &SignerIdentity,
        subject: &OrgId,
        action: ActionType,
    ) -> HierarchyResult<Role> {
        self.state.read().entitlement(signer, subject, action)
    }

    fn role_of(&self, signer: &SignerIdentity) -> Option<Role> {
        self.state.read().role_of(signer)
    }

    fn organization_of(&self, signer: &SignerIdentity) -> Option<OrgId> {
        self.state.read().organization_of(signer).cloned()
    }

    fn organization(&self, id: &OrgId) -> HierarchyResult<Organization> {
        self.state.read().org(id).cloned()
    }

    fn link(&self, id: &LinkId) -> HierarchyResult<Link> {
        self.state.read().link(id).cloned()
    }

    fn links_for_subject(&self, subject: &OrgId) -> Vec<Link> {
        self.state.read().links_for_subject(subject)
    }

    fn assign_subject(
        &self,
        by: &SignerIdentity,
        subject: &OrgId,
        verifier: &OrgId,
        permissions: Permissions,
        mode: AssignMode,
    ) -> HierarchyResult<AssignOutcome> {
        let now = self.time_source.now();
        let result = self
            .state
            .write()
            .assign_subject(by, subject, verifier, permissions, mode, now);
        match &result {
            Ok(outcome) => info!(
                link_id = %outcome.link.id,
                subject = %subject,
                verifier = %verifier,
                replaced = ?outcome.replaced,
                "[bc-01] Subject assigned"
            ),
            Err(e) => warn!(subject = %subject, verifier = %verifier, error = %e, "[bc-01] Assignment refused"),
        }
        result
    }

    fn revoke_link(&self, id: &LinkId, by: &SignerIdentity) -> HierarchyResult<Link> {
        let now = self.time_source.now();
        let link = self.state.write().revoke_link(id, by, now)?;
        info!(link_id = %id, subject = %link.subject, "[bc-01] Link revoked");
        Ok(link)
    }
}
