//! # Adapters

pub mod content;

pub use content::{InMemoryContentStore, LOCATOR_SCHEME};
