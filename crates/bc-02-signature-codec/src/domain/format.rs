//! # Signature Format and Freshness
//!
//! Encoding checks only. No cryptography happens here; recovery is delegated
//! to the `SignerRecovery` collaborator.

use shared_types::Timestamp;

use super::errors::{CodecError, CodecResult};

/// Length of `r || s || v` in bytes.
pub const SIGNATURE_LEN: usize = 65;

/// A 65-byte recoverable secp256k1 signature split into components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id: 0, 1, 27 or 28.
    pub v: u8,
}

impl RecoverableSignature {
    /// Parses `0x` + 130 hex characters.
    pub fn parse(signature: &str) -> CodecResult<Self> {
        let hex_part = signature
            .strip_prefix("0x")
            .ok_or_else(|| CodecError::InvalidFormat("missing 0x prefix".into()))?;
        if hex_part.len() != SIGNATURE_LEN * 2 {
            return Err(CodecError::InvalidFormat(format!(
                "expected {} hex characters, got {}",
                SIGNATURE_LEN * 2,
                hex_part.len()
            )));
        }
        let bytes = hex::decode(hex_part)
            .map_err(|e| CodecError::InvalidFormat(format!("not hex: {e}")))?;
        let v = bytes[64];
        if !matches!(v, 0 | 1 | 27 | 28) {
            return Err(CodecError::InvalidRecoveryId(v));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v })
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(SIGNATURE_LEN);
        bytes.extend_from_slice(&self.r);
        bytes.extend_from_slice(&self.s);
        bytes.push(self.v);
        format!("0x{}", hex::encode(bytes))
    }
}

/// True if `signature` is well-formed. Says nothing about who signed it.
pub fn validate_format(signature: &str) -> bool {
    RecoverableSignature::parse(signature).is_ok()
}

/// Accepted timestamp range around "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    /// How far in the past a timestamp may lie.
    pub max_age_ms: u64,
    /// How far in the future a timestamp may lie (clock skew).
    pub max_future_skew_ms: u64,
}

impl FreshnessWindow {
    pub fn from_secs(max_age_secs: u64, max_future_skew_secs: u64) -> Self {
        Self {
            max_age_ms: max_age_secs.saturating_mul(1000),
            max_future_skew_ms: max_future_skew_secs.saturating_mul(1000),
        }
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::from_secs(300, 30)
    }
}

/// Accepts `now - max_age <= timestamp <= now + skew`. Both bounds inclusive.
pub fn is_fresh(timestamp: Timestamp, now: Timestamp, window: &FreshnessWindow) -> bool {
    let oldest = now.saturating_sub(window.max_age_ms);
    let newest = now.saturating_add(window.max_future_skew_ms);
    timestamp >= oldest && timestamp <= newest
}
