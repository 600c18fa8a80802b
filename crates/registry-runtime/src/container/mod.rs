//! # Registry Container
//!
//! Holds every component instance with its adapters, built in dependency
//! order from one `RegistryConfig`.

pub mod components;
pub mod config;

pub use components::{ContainerError, RegistryContainer};
pub use config::{
    AuditConfig, ConfigError, ContentStoreConfig, LedgerConfig, RegistryConfig, SecurityConfig,
};
