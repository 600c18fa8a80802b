//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

/// Signature codec and signer collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Not `0x` + 130 hex characters.
    #[error("invalid signature format: {0}")]
    InvalidFormat(String),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// High-S signature (EIP-2).
    #[error("malleable signature: S value in upper half of curve order")]
    MalleableSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,

    /// The signer collaborator holds no key for this identity.
    #[error("no signing key for {0}")]
    UnknownSigner(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::InvalidFormat(_)
            | CodecError::InvalidRecoveryId(_)
            | CodecError::MalleableSignature
            | CodecError::RecoveryFailed => ErrorKind::InvalidSignatureFormat,
            CodecError::UnknownSigner(_) | CodecError::SigningFailed(_) => ErrorKind::InvalidAction,
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
