//! # Signature Codec (BC-02)
//!
//! Builds canonical signing payloads and validates signature format and
//! timestamp freshness.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): message layout, format checks, freshness
//! - **Ports Layer** (`ports/`): `MessageSigner`, `SignerRecovery`
//! - **Adapters** (`adapters/`): secp256k1 recovery and a local keyring
//!
//! ## Security Notes
//!
//! - `validate_format` checks encoding only. Whether a signature belongs to
//!   the claimed signer is answered by `SignerRecovery`.
//! - Messages escape `\\`, `\n` and `\r` so a free-text field can never
//!   forge another field's line.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{LocalKeyring, Secp256k1Recovery};
pub use domain::errors::{CodecError, CodecResult};
pub use domain::format::{is_fresh, validate_format, FreshnessWindow, RecoverableSignature};
pub use domain::message::{SignatureCodec, MESSAGE_HEADER, MESSAGE_VERSION};
pub use ports::outbound::{MessageSigner, SignerRecovery};
