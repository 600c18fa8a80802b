//! # Nonce Registry
//!
//! Replay protection keyed by `(signer, nonce)`.
//!
//! ## Rules
//!
//! - A pair first seen is reserved together with the digest of its payload.
//! - The same payload re-presented while reserved is a retry of the same
//!   logical action (its earlier attempt timed out or was cancelled).
//! - A different payload under a seen pair is always rejected.
//! - Once consumed (committed or reverted on the ledger) a pair is never
//!   accepted again.
//! - A reservation whose attempt failed before reaching the ledger is
//!   released, so the pair is unseen again.
//!
//! Pairs of either state older than the retention window are pruned; by
//! then the freshness check rejects the old signed action anyway. An attempt
//! still waiting on the ledger resumes from its pending reference, not from
//! this registry.

use shared_types::{Nonce, SignerIdentity, Timestamp};
use std::collections::HashMap;

use crate::domain::entities::NonceState;

#[derive(Debug, Clone, PartialEq, Eq)]
struct NonceRecord {
    state: NonceState,
    payload_digest: [u8; 32],
    timestamp: Timestamp,
}

/// Outcome of looking a pair up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// Never seen.
    Fresh,
    /// Reserved with the same payload.
    Retry,
    /// Seen with another payload, or already consumed.
    Reused,
}

#[derive(Debug)]
pub struct NonceRegistry {
    records: HashMap<(SignerIdentity, Nonce), NonceRecord>,
    retention_ms: u64,
    last_prune: Timestamp,
    prune_interval_ms: u64,
}

impl NonceRegistry {
    pub const DEFAULT_PRUNE_INTERVAL_MS: u64 = 10_000;

    /// `retention_ms` should be at least twice the freshness window.
    pub fn new(retention_ms: u64) -> Self {
        Self {
            records: HashMap::new(),
            retention_ms,
            last_prune: 0,
            prune_interval_ms: Self::DEFAULT_PRUNE_INTERVAL_MS,
        }
    }

    pub fn check(&self, signer: &SignerIdentity, nonce: &Nonce, digest: &[u8; 32]) -> NonceCheck {
        match self.records.get(&(signer.clone(), nonce.clone())) {
            None => NonceCheck::Fresh,
            Some(record) => match record.state {
                NonceState::Reserved if &record.payload_digest == digest => NonceCheck::Retry,
                _ => NonceCheck::Reused,
            },
        }
    }

    /// Reserves the pair, re-checking under the caller's exclusive borrow.
    pub fn reserve(
        &mut self,
        signer: &SignerIdentity,
        nonce: &Nonce,
        digest: [u8; 32],
        timestamp: Timestamp,
    ) -> NonceCheck {
        let check = self.check(signer, nonce, &digest);
        if check == NonceCheck::Fresh {
            self.records.insert(
                (signer.clone(), nonce.clone()),
                NonceRecord {
                    state: NonceState::Reserved,
                    payload_digest: digest,
                    timestamp,
                },
            );
        }
        check
    }

    /// Marks a reserved pair consumed. Unknown pairs are recorded as consumed.
    pub fn consume(
        &mut self,
        signer: &SignerIdentity,
        nonce: &Nonce,
        digest: [u8; 32],
        timestamp: Timestamp,
    ) {
        self.records
            .entry((signer.clone(), nonce.clone()))
            .and_modify(|record| record.state = NonceState::Consumed)
            .or_insert(NonceRecord {
                state: NonceState::Consumed,
                payload_digest: digest,
                timestamp,
            });
    }

    /// Forgets a reservation that never reached the ledger. Consumed pairs
    /// and reservations of another payload are left alone.
    pub fn release(&mut self, signer: &SignerIdentity, nonce: &Nonce, digest: &[u8; 32]) -> bool {
        let key = (signer.clone(), nonce.clone());
        match self.records.get(&key) {
            Some(record)
                if record.state == NonceState::Reserved && &record.payload_digest == digest =>
            {
                self.records.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, signer: &SignerIdentity, nonce: &Nonce) -> Option<NonceState> {
        self.records
            .get(&(signer.clone(), nonce.clone()))
            .map(|record| record.state)
    }

    /// Drops pairs past retention, at most once per prune interval.
    pub fn maybe_prune(&mut self, now: Timestamp) -> usize {
        if now.saturating_sub(self.last_prune) < self.prune_interval_ms {
            return 0;
        }
        self.last_prune = now;
        let threshold = now.saturating_sub(self.retention_ms);
        let before = self.records.len();
        self.records.retain(|_, record| record.timestamp > threshold);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
