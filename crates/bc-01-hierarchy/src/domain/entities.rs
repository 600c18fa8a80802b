//! # Domain Entities
//!
//! Organizations and the verifier/subject links between them.

use serde::{Deserialize, Serialize};
use shared_types::{LinkId, OrgId, RegionCode, SignerIdentity, Timestamp, SCHEMA_VERSION};
use std::collections::BTreeSet;

/// Kind of organization in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrgKind {
    Authority,
    Verifier,
    Subject,
}

/// Jurisdiction of an authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "region", rename_all = "camelCase")]
pub enum AuthorityScope {
    National,
    Regional(RegionCode),
}

/// A node in the organizational tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub schema_version: u16,
    pub id: OrgId,
    pub kind: OrgKind,
    pub name: String,
    /// Region of a subject or regional authority.
    pub region: Option<RegionCode>,
    /// Set for authorities only.
    pub authority_scope: Option<AuthorityScope>,
    /// `None` only for the national root authority.
    pub parent: Option<OrgId>,
    pub children: BTreeSet<OrgId>,
}

impl Organization {
    pub(crate) fn new(
        id: OrgId,
        kind: OrgKind,
        name: String,
        region: Option<RegionCode>,
        authority_scope: Option<AuthorityScope>,
        parent: Option<OrgId>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            id,
            kind,
            name,
            region,
            authority_scope,
            parent,
            children: BTreeSet::new(),
        }
    }

    pub fn is_national_authority(&self) -> bool {
        matches!(self.authority_scope, Some(AuthorityScope::National))
    }

    /// Region this authority is restricted to, if regional.
    pub fn authority_region(&self) -> Option<&RegionCode> {
        match &self.authority_scope {
            Some(AuthorityScope::Regional(region)) => Some(region),
            _ => None,
        }
    }
}

/// Data-access permissions granted along with a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub may_verify_data: bool,
    pub may_edit_profile: bool,
    pub may_view_financials: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            may_verify_data: true,
            may_edit_profile: false,
            may_view_financials: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkStatus {
    Active,
    Revoked,
}

/// Assignment of a subject to a verifier.
///
/// Revocation only changes `status`; links are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub schema_version: u16,
    pub id: LinkId,
    pub verifier: OrgId,
    pub subject: OrgId,
    pub status: LinkStatus,
    pub assigned_by: SignerIdentity,
    pub assigned_at: Timestamp,
    pub revoked_by: Option<SignerIdentity>,
    pub revoked_at: Option<Timestamp>,
    pub permissions: Permissions,
}

impl Link {
    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active
    }
}

/// Whether an assignment may displace an existing active link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignMode {
    /// Fail with `AlreadyLinked` if the subject already has an active link.
    #[default]
    New,
    /// Revoke the subject's current link and assign the new verifier.
    Replace,
}
