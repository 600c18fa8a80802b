//! # Outbound Ports
//!
//! The external signer collaborator. The registry never holds private keys;
//! it only asks for signer recovery. `MessageSigner` is what wallets (or the
//! development keyring) provide to callers.

use async_trait::async_trait;
use shared_types::SignerIdentity;

use crate::domain::errors::CodecResult;

/// Produces signatures over canonical messages.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Sign `message` as `signer`, returning a `0x`-prefixed 65-byte signature.
    async fn sign(&self, message: &str, signer: &SignerIdentity) -> CodecResult<String>;
}

/// Recovers the identity that produced a signature.
#[async_trait]
pub trait SignerRecovery: Send + Sync {
    /// Identity whose key signed `message`, or an error if the signature
    /// cannot be recovered.
    async fn recover_signer(&self, message: &str, signature: &str) -> CodecResult<SignerIdentity>;
}
