//! # Domain Entities

use serde::{Deserialize, Serialize};
use shared_types::{IdempotencyKey, OrgId, Role, SignedAction, Stage};

/// Longest accepted rejection reason, in bytes.
pub const MAX_REASON_LEN: usize = 1024;

/// Largest accepted metadata blob, in bytes.
pub const MAX_METADATA_LEN: usize = 64 * 1024;

/// What the authorizer needs to know about the target project.
#[derive(Debug, Clone, Copy)]
pub struct ProjectContext<'a> {
    /// Submitting organization, the anchor for every role check.
    pub subject: &'a OrgId,
    /// Last committed stage.
    pub stage: Stage,
    /// A ledger call under the action's idempotency key is still outstanding.
    pub submitted: bool,
}

/// A signed action that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedAction {
    pub signed: SignedAction,
    /// Role the signer acted under.
    pub role: Role,
    pub target_stage: Stage,
    pub idempotency_key: IdempotencyKey,
    /// True when this re-presents a reserved action whose earlier attempt
    /// never reached a terminal outcome.
    pub retry: bool,
}

/// Lifecycle of a `(signer, nonce)` pair.
///
/// ```text
/// (unseen) ──authorize──→ Reserved ──commit / revert──→ Consumed
///    ↑                       │  ↑
///    └──failed before submit─┤  │
///                            └──┘ same payload re-presented (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NonceState {
    Reserved,
    Consumed,
}
