//! # Ledger Orchestrator (BC-05)
//!
//! Submits the on-chain call for a transition, awaits confirmation with a
//! timeout and keeps pending references so a timed-out transition can be
//! polled again rather than resubmitted.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): ledger calls, receipts, confirmations
//! - **Ports Layer** (`ports/`): `TransitionLedger` (inbound), `LedgerClient` (outbound)
//! - **Service Layer** (`service.rs`): `LedgerOrchestrator`
//! - **Adapters** (`adapters/`): `InMemoryLedger`
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | No double submission | pending references keyed by idempotency key |
//! | Bounded waits | `tokio::time::timeout` around receipt polling |
//! | Verbatim revert reasons | receipt reason passed through untouched |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryLedger, LedgerBehaviour};
pub use domain::entities::{
    Confirmation, LedgerCall, LedgerReceipt, OrchestratorConfig, PendingTxRef, ReceiptOutcome,
    TransitionPayload, TxHash,
};
pub use domain::errors::{LedgerError, LedgerResult};
pub use ports::inbound::TransitionLedger;
pub use ports::outbound::LedgerClient;
pub use service::LedgerOrchestrator;
