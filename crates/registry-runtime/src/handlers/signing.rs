//! Offline signing for operators and scripts.
//!
//! The registry process never holds keys. `registry-node sign` runs as a
//! separate invocation: it loads one secret, signs one action and exits.

use bc_02_signature_codec::{CodecError, CodecResult, LocalKeyring, SignatureCodec};
use shared_types::{Nonce, ProposedAction, SignedAction, SignerIdentity, Timestamp};

/// Secret-holding signer for a single identity.
pub struct OfflineSigner {
    keyring: LocalKeyring,
    signer: SignerIdentity,
}

impl OfflineSigner {
    /// Imports a 32-byte secp256k1 secret given as hex, with or without `0x`.
    pub fn from_secret_hex(secret_hex: &str) -> CodecResult<Self> {
        let trimmed = secret_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| CodecError::SigningFailed(format!("secret is not hex: {e}")))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CodecError::SigningFailed("secret must be 32 bytes".into()))?;
        let keyring = LocalKeyring::new();
        let signer = keyring.import(&secret)?;
        Ok(Self { keyring, signer })
    }

    pub fn identity(&self) -> &SignerIdentity {
        &self.signer
    }

    /// Builds the canonical message for `action` and signs it with a fresh
    /// random nonce.
    pub fn sign(
        &self,
        action: ProposedAction,
        timestamp: Timestamp,
        metadata: Option<Vec<u8>>,
    ) -> CodecResult<SignedAction> {
        let nonce = Nonce::parse(uuid::Uuid::new_v4().simple().to_string())
            .map_err(|e| CodecError::SigningFailed(e.to_string()))?;
        let mut signed = SignedAction {
            action,
            signer: self.signer.clone(),
            timestamp,
            nonce,
            canonical_message: String::new(),
            signature: String::new(),
            metadata,
        };
        signed.canonical_message = SignatureCodec::message_for(&signed);
        signed.signature = self
            .keyring
            .sign_message(&signed.canonical_message, &self.signer)?;
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_02_signature_codec::{Secp256k1Recovery, SignerRecovery};
    use shared_types::ProjectId;

    const SECRET: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[tokio::test]
    async fn test_signed_action_recovers_to_identity() {
        let signer = OfflineSigner::from_secret_hex(SECRET).unwrap();
        let signed = signer
            .sign(
                ProposedAction::Verify {
                    project_id: ProjectId::parse("P1").unwrap(),
                },
                1_700_000_000_000,
                None,
            )
            .unwrap();
        let recovered = Secp256k1Recovery::new()
            .recover_signer(&signed.canonical_message, &signed.signature)
            .await
            .unwrap();
        assert_eq!(&recovered, signer.identity());
        assert_eq!(signed.nonce.as_str().len(), 32);
    }

    #[test]
    fn test_rejects_short_secret() {
        assert!(OfflineSigner::from_secret_hex("0xabcd").is_err());
        assert!(OfflineSigner::from_secret_hex("zz").is_err());
    }
}
