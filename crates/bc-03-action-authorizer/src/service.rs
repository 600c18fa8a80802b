//! # Action Authorizer Service
//!
//! Runs the checks in a fixed order; the first failure wins.
//!
//! ```text
//! 1 action fields ─→ 2 signature format ─→ 3 canonical message ─→ 4 signer recovery
//!                                                                        │
//! 8 entitlement ←─ 7 stage guard ←─ 6 freshness (skipped if submitted) ←─ 5 nonce
//! ```
//!
//! Cheap, local checks run before the recovery call, and nothing is
//! reserved until every check has passed.

use async_trait::async_trait;
use bc_01_hierarchy::HierarchyApi;
use bc_02_signature_codec::{
    is_fresh, FreshnessWindow, RecoverableSignature, SignatureCodec, SignerRecovery,
};
use parking_lot::Mutex;
use shared_types::{
    Nonce, ProposedAction, SignedAction, SignerIdentity, SystemTimeSource, TimeSource,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::{
    AuthorizedAction, NonceState, ProjectContext, MAX_METADATA_LEN, MAX_REASON_LEN,
};
use crate::domain::errors::{AuthorizationError, AuthorizationResult};
use crate::domain::nonce::{NonceCheck, NonceRegistry};
use crate::ports::inbound::AuthorizationApi;

pub struct ActionAuthorizer {
    hierarchy: Arc<dyn HierarchyApi>,
    recovery: Arc<dyn SignerRecovery>,
    window: FreshnessWindow,
    time_source: Arc<dyn TimeSource>,
    nonces: Mutex<NonceRegistry>,
}

impl ActionAuthorizer {
    pub fn new(
        hierarchy: Arc<dyn HierarchyApi>,
        recovery: Arc<dyn SignerRecovery>,
        window: FreshnessWindow,
    ) -> Self {
        Self::with_time_source(hierarchy, recovery, window, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        hierarchy: Arc<dyn HierarchyApi>,
        recovery: Arc<dyn SignerRecovery>,
        window: FreshnessWindow,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let retention = window
            .max_age_ms
            .saturating_add(window.max_future_skew_ms)
            .saturating_mul(2);
        Self {
            hierarchy,
            recovery,
            window,
            time_source,
            nonces: Mutex::new(NonceRegistry::new(retention)),
        }
    }

    pub fn window(&self) -> FreshnessWindow {
        self.window
    }

    pub fn nonce_state(&self, signer: &SignerIdentity, nonce: &Nonce) -> Option<NonceState> {
        self.nonces.lock().state(signer, nonce)
    }

    fn check_fields(signed: &SignedAction) -> AuthorizationResult<()> {
        if let ProposedAction::Reject { reason, .. } = &signed.action {
            if reason.trim().is_empty() {
                return Err(AuthorizationError::InvalidAction(
                    "reject requires a reason".into(),
                ));
            }
            if reason.len() > MAX_REASON_LEN {
                return Err(AuthorizationError::InvalidAction(format!(
                    "reason exceeds {MAX_REASON_LEN} bytes"
                )));
            }
        }
        if let Some(blob) = &signed.metadata {
            if blob.len() > MAX_METADATA_LEN {
                return Err(AuthorizationError::InvalidAction(format!(
                    "metadata exceeds {MAX_METADATA_LEN} bytes"
                )));
            }
        }
        Ok(())
    }

    fn check_stage(signed: &SignedAction, project: &ProjectContext<'_>) -> AuthorizationResult<()> {
        if project.stage.is_terminal() {
            return Err(AuthorizationError::AlreadyFinal {
                stage: project.stage,
            });
        }
        if let Some(required) = signed.action_type().required_stage() {
            if project.stage != required {
                return Err(AuthorizationError::WrongStage {
                    current: project.stage,
                    required,
                });
            }
        }
        if signed.action.credit_amount() == Some(0) {
            return Err(AuthorizationError::InvalidAction(
                "finalApprove requires a positive credit amount".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationApi for ActionAuthorizer {
    async fn authorize(
        &self,
        signed: &SignedAction,
        project: ProjectContext<'_>,
    ) -> AuthorizationResult<AuthorizedAction> {
        let action_type = signed.action_type();
        debug!(
            project = %signed.project_id(),
            action = %action_type,
            signer = %signed.signer,
            "[bc-03] Authorizing action"
        );

        // 1-3: local checks.
        Self::check_fields(signed)?;
        RecoverableSignature::parse(&signed.signature)
            .map_err(|e| AuthorizationError::InvalidSignatureFormat(e.to_string()))?;
        let expected = SignatureCodec::message_for(signed);
        if expected != signed.canonical_message {
            warn!(project = %signed.project_id(), "[bc-03] Canonical message mismatch");
            return Err(AuthorizationError::MessageMismatch);
        }

        // 4: the signature must belong to the claimed signer.
        let recovered = self
            .recovery
            .recover_signer(&signed.canonical_message, &signed.signature)
            .await?;
        if recovered != signed.signer {
            warn!(
                claimed = %signed.signer,
                recovered = %recovered,
                "[bc-03] Signer mismatch"
            );
            return Err(AuthorizationError::SignerMismatch {
                claimed: signed.signer.clone(),
                recovered,
            });
        }

        // 5: replay.
        let digest = signed.payload_digest();
        let now = self.time_source.now();
        let check = {
            let mut nonces = self.nonces.lock();
            nonces.maybe_prune(now);
            nonces.check(&signed.signer, &signed.nonce, &digest)
        };
        if check == NonceCheck::Reused {
            return Err(AuthorizationError::NonceReused {
                signer: signed.signer.clone(),
                nonce: signed.nonce.clone(),
            });
        }
        let retry = check == NonceCheck::Retry;

        // 6: freshness, unless an earlier attempt is already on the ledger.
        if !(retry && project.submitted) && !is_fresh(signed.timestamp, now, &self.window) {
            if retry && self.nonces.lock().release(&signed.signer, &signed.nonce, &digest) {
                debug!(signer = %signed.signer, nonce = %signed.nonce, "[bc-03] Stale reservation released");
            }
            return Err(AuthorizationError::StaleTimestamp {
                timestamp: signed.timestamp,
                now,
                max_age_ms: self.window.max_age_ms,
            });
        }

        // 7-8: project state and role.
        Self::check_stage(signed, &project)?;
        let role = self
            .hierarchy
            .entitlement(&signed.signer, project.subject, action_type)?;
        let target_stage = project.stage.next_for(action_type).ok_or_else(|| {
            AuthorizationError::InvalidAction(format!(
                "{action_type} is not applicable at {}",
                project.stage
            ))
        })?;

        // Re-check under the lock: a concurrent presentation may have won.
        let reserved =
            self.nonces
                .lock()
                .reserve(&signed.signer, &signed.nonce, digest, signed.timestamp);
        if reserved == NonceCheck::Reused {
            return Err(AuthorizationError::NonceReused {
                signer: signed.signer.clone(),
                nonce: signed.nonce.clone(),
            });
        }

        info!(
            project = %signed.project_id(),
            action = %action_type,
            role = %role,
            target = %target_stage,
            retry,
            "[bc-03] Action authorized"
        );
        Ok(AuthorizedAction {
            signed: signed.clone(),
            role,
            target_stage,
            idempotency_key: signed.idempotency_key(),
            retry: retry || reserved == NonceCheck::Retry,
        })
    }

    fn consume(&self, signed: &SignedAction) {
        self.nonces.lock().consume(
            &signed.signer,
            &signed.nonce,
            signed.payload_digest(),
            signed.timestamp,
        );
        debug!(signer = %signed.signer, nonce = %signed.nonce, "[bc-03] Nonce consumed");
    }

    fn release(&self, signed: &SignedAction) {
        let released = self.nonces.lock().release(
            &signed.signer,
            &signed.nonce,
            &signed.payload_digest(),
        );
        if released {
            debug!(signer = %signed.signer, nonce = %signed.nonce, "[bc-03] Reservation released");
        }
    }
}
