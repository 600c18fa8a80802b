//! # Local Keyring
//!
//! A development and test `MessageSigner` that holds secp256k1 keys in
//! memory. Production callers sign with their own wallet; the registry
//! itself only ever recovers signers.

use std::collections::HashMap;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::RwLock;
use shared_types::SignerIdentity;
use zeroize::Zeroize;

use super::secp256k1::{address_from_pubkey, invert_s, is_low_s, personal_message_hash};
use crate::domain::errors::{CodecError, CodecResult};
use crate::domain::format::RecoverableSignature;
use crate::ports::outbound::MessageSigner;

/// In-memory key store keyed by signer identity.
#[derive(Default)]
pub struct LocalKeyring {
    keys: RwLock<HashMap<SignerIdentity, SigningKey>>,
}

impl LocalKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh random key and returns its identity.
    pub fn generate(&self) -> SignerIdentity {
        self.insert(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Imports a key from its 32-byte secret scalar.
    pub fn import(&self, secret: &[u8; 32]) -> CodecResult<SignerIdentity> {
        let mut bytes = *secret;
        let key = SigningKey::from_slice(&bytes);
        bytes.zeroize();
        let key = key.map_err(|_| CodecError::SigningFailed("invalid secret key".into()))?;
        Ok(self.insert(key))
    }

    fn insert(&self, key: SigningKey) -> SignerIdentity {
        let identity = SignerIdentity::from_address(address_from_pubkey(key.verifying_key()));
        self.keys.write().insert(identity.clone(), key);
        identity
    }

    pub fn contains(&self, signer: &SignerIdentity) -> bool {
        self.keys.read().contains_key(signer)
    }

    /// Signs `message` with EIP-191 hashing and a low-S, `v ∈ {27, 28}` encoding.
    pub fn sign_message(&self, message: &str, signer: &SignerIdentity) -> CodecResult<String> {
        let keys = self.keys.read();
        let key = keys
            .get(signer)
            .ok_or_else(|| CodecError::UnknownSigner(signer.to_string()))?;
        let hash = personal_message_hash(message.as_bytes());
        let (sig, recid) = key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| CodecError::SigningFailed(e.to_string()))?;

        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        let mut parity = recid.to_byte() & 1;
        if !is_low_s(&s) {
            s = invert_s(&s);
            parity ^= 1;
        }
        Ok(RecoverableSignature { r, s, v: 27 + parity }.to_hex())
    }
}

#[async_trait]
impl MessageSigner for LocalKeyring {
    async fn sign(&self, message: &str, signer: &SignerIdentity) -> CodecResult<String> {
        self.sign_message(message, signer)
    }
}
