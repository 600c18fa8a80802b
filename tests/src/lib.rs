//! # BlueCarbon Registry Test Suite
//!
//! Cross-component scenarios driven through `RegistryService`, the same
//! surface the JSON-lines RPC uses.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs    # Registry harness with offline signers
//!     ├── lifecycle.rs   # Submission to issuance
//!     ├── security.rs    # Signatures, freshness, replay, links
//!     └── recovery.rs    # Ledger timeouts, reverts, audit outages
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bc-tests
//! cargo test -p bc-tests integration::recovery::
//! ```

pub mod integration;
