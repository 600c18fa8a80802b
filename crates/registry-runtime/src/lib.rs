//! # BlueCarbon Registry Runtime
//!
//! Wires the six components into one process and exposes the caller-facing
//! operations.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and component wiring
//! - `service` - `RegistryService`, the operation surface with stable error kinds
//! - `handlers/` - JSON-lines RPC and offline signing
//!
//! ## Request Flow
//!
//! ```text
//! stdin line ──→ handlers::rpc ──→ RegistryService
//!                                      │
//!        ┌─────────────────┬───────────┴──────────┬──────────────────┐
//!        ↓                 ↓                      ↓                  ↓
//!  Hierarchy(1)     ProjectWorkflow(4)      AuditRecorder(6)    Event Bus
//!                          │
//!            ┌─────────────┼──────────────┐
//!            ↓             ↓              ↓
//!     Authorizer(3)   Ledger(5)     AuditRecorder(6)
//! ```

pub mod container;
pub mod handlers;
pub mod service;

pub use container::{ConfigError, ContainerError, RegistryConfig, RegistryContainer};
pub use service::{OrgRegistration, ReconcileReport, RegistryError, RegistryResult, RegistryService};
