//! # Outbound Ports
//!
//! The content-addressed blob store. The workflow keeps only the returned
//! locator and never interprets blob contents, except for the issuance
//! certificates it writes itself.

use async_trait::async_trait;

use crate::domain::errors::ContentError;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores `blob`, returning a stable locator.
    async fn put(&self, blob: Vec<u8>) -> Result<String, ContentError>;

    async fn get(&self, locator: &str) -> Result<Option<Vec<u8>>, ContentError>;
}
