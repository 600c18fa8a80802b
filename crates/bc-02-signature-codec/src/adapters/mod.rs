//! # Adapters
//!
//! secp256k1 implementations of the signer collaborator ports.

pub mod keyring;
pub mod secp256k1;

pub use keyring::LocalKeyring;
pub use secp256k1::Secp256k1Recovery;
