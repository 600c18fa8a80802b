//! # secp256k1 Signer Recovery
//!
//! Recovers an Ethereum-style address from an EIP-191 personal-message
//! signature, as produced by browser wallets.
//!
//! ## Security Notes
//!
//! - **Malleability Prevention (EIP-2)**: S must be strictly below n/2
//! - **Scalar Range Validation**: R and S must be in [1, n-1]
//! - **Constant-Time Comparisons**: scalar checks use the `subtle` crate

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use shared_types::SignerIdentity;
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;
use zeroize::Zeroize;

use crate::domain::errors::{CodecError, CodecResult};
use crate::domain::format::RecoverableSignature;
use crate::ports::outbound::SignerRecovery;

/// secp256k1 curve order n
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// n/2, the malleability bound.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Signer recovery over secp256k1 with EIP-191 message hashing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Recovery;

impl Secp256k1Recovery {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous recovery, used by the async port and by tests.
    pub fn recover(&self, message: &str, signature: &str) -> CodecResult<SignerIdentity> {
        let parsed = RecoverableSignature::parse(signature)?;
        let hash = personal_message_hash(message.as_bytes());
        let address = recover_address(&hash, &parsed)?;
        Ok(SignerIdentity::from_address(address))
    }
}

#[async_trait]
impl SignerRecovery for Secp256k1Recovery {
    async fn recover_signer(&self, message: &str, signature: &str) -> CodecResult<SignerIdentity> {
        let recovered = self.recover(message, signature);
        if let Err(e) = &recovered {
            debug!(error = %e, "[bc-02] Signer recovery failed");
        }
        recovered
    }
}

// =============================================================================
// HASHING
// =============================================================================

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 version 0x45: `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Derive the 20-byte address from a public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> [u8; 20] {
    let encoded = public_key.to_encoded_point(false);
    // skip the 0x04 uncompressed-point tag
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

// =============================================================================
// RECOVERY
// =============================================================================

fn recover_address(hash: &[u8; 32], signature: &RecoverableSignature) -> CodecResult<[u8; 20]> {
    if !is_valid_scalar(&signature.r) || !is_valid_scalar(&signature.s) {
        return Err(CodecError::InvalidFormat("scalar out of range".into()));
    }
    if !is_low_s(&signature.s) {
        return Err(CodecError::MalleableSignature);
    }
    let recovery_id = parse_recovery_id(signature.v)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);
    let sig = Signature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = sig.map_err(|_| CodecError::InvalidFormat("not a valid ECDSA signature".into()))?;

    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| CodecError::RecoveryFailed)?;
    Ok(address_from_pubkey(&key))
}

fn parse_recovery_id(v: u8) -> CodecResult<RecoveryId> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(CodecError::InvalidRecoveryId(v)),
    };
    RecoveryId::try_from(id).map_err(|_| CodecError::InvalidRecoveryId(v))
}

/// Constant-time lexicographic compare: returns (a < b, a > b).
fn ct_compare(a: &[u8; 32], b: &[u8; 32]) -> (Choice, Choice) {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);
    for i in 0..32 {
        let undecided = !(less | greater);
        less |= undecided & Choice::from((a[i] < b[i]) as u8);
        greater |= undecided & Choice::from((a[i] > b[i]) as u8);
    }
    (less, greater)
}

/// S strictly below n/2 (EIP-2).
pub(crate) fn is_low_s(s: &[u8; 32]) -> bool {
    let (less, _) = ct_compare(s, &SECP256K1_HALF_ORDER);
    less.into()
}

/// Scalar in [1, n-1].
fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    let mut is_zero = Choice::from(1u8);
    for byte in scalar {
        is_zero &= byte.ct_eq(&0u8);
    }
    let (less, _) = ct_compare(scalar, &SECP256K1_ORDER);
    (!is_zero & less).into()
}

/// s' = n - s, flipping a high-S signature to its low-S twin.
pub(crate) fn invert_s(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;
    for i in (0..32).rev() {
        let diff = (SECP256K1_ORDER[i] as i32) - (s[i] as i32) - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}
