//! # Adapters

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlAuditStore;
pub use memory::InMemoryAuditStore;
