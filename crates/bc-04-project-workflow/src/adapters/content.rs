//! In-memory content store. Locators are content addresses, so equal blobs
//! share one locator.

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::errors::ContentError;
use crate::ports::outbound::ContentStore;

pub const LOCATOR_SCHEME: &str = "mem://sha256/";

#[derive(Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    puts: AtomicU64,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    async fn simulate(&self) -> Result<(), ContentError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ContentError::Unavailable("content store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, blob: Vec<u8>) -> Result<String, ContentError> {
        self.simulate().await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        let locator = format!("{LOCATOR_SCHEME}{}", hex::encode(Sha256::digest(&blob)));
        self.blobs.write().insert(locator.clone(), blob);
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<Option<Vec<u8>>, ContentError> {
        self.simulate().await?;
        Ok(self.blobs.read().get(locator).cloned())
    }
}
