//! # Component Container
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: HierarchyStore (bc-01), Secp256k1Recovery (bc-02)
//! Level 1: ActionAuthorizer (bc-03), LedgerOrchestrator (bc-05), AuditRecorder (bc-06)
//! Level 2: ProjectWorkflow (bc-04)
//! ```
//!
//! The ledger client is the in-memory adapter; a chain-backed client plugs in
//! behind the same `LedgerClient` port.

use std::sync::Arc;

use bc_01_hierarchy::HierarchyStore;
use bc_02_signature_codec::Secp256k1Recovery;
use bc_03_action_authorizer::ActionAuthorizer;
use bc_04_project_workflow::{InMemoryContentStore, ProjectWorkflow, WorkflowDeps};
use bc_05_ledger_orchestrator::{InMemoryLedger, LedgerOrchestrator};
use bc_06_audit_recorder::{AuditError, AuditRecorder, AuditStore, InMemoryAuditStore, JsonlAuditStore};
use shared_bus::InMemoryEventBus;
use shared_types::{SystemTimeSource, TimeSource};
use thiserror::Error;
use tracing::{info, warn};

use crate::container::config::{ConfigError, RegistryConfig};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("audit store: {0}")]
    Audit(#[from] AuditError),
}

/// Every component instance, shared by the service and background tasks.
pub struct RegistryContainer {
    pub config: RegistryConfig,

    // =========================================================================
    // LEVEL 0
    // =========================================================================
    /// Organization tree and verifier links (Component 1).
    pub hierarchy: Arc<HierarchyStore>,

    // =========================================================================
    // LEVEL 1
    // =========================================================================
    /// Signed-action validation (Component 3).
    pub authorizer: Arc<ActionAuthorizer>,
    /// Ledger client behind the orchestrator.
    pub ledger: Arc<InMemoryLedger>,
    /// Submit/confirm orchestration (Component 5).
    pub orchestrator: Arc<LedgerOrchestrator>,
    /// Audit trail (Component 6).
    pub recorder: Arc<AuditRecorder>,

    // =========================================================================
    // LEVEL 2
    // =========================================================================
    /// Project state machine (Component 4).
    pub workflow: Arc<ProjectWorkflow>,

    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    pub content: Arc<InMemoryContentStore>,
    pub bus: Arc<InMemoryEventBus>,
}

impl RegistryContainer {
    pub fn new(config: RegistryConfig) -> Result<Self, ContainerError> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: RegistryConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, ContainerError> {
        config.validate()?;

        let audit_store: Arc<dyn AuditStore> = match &config.audit.data_dir {
            Some(dir) => Arc::new(JsonlAuditStore::open(dir)?),
            None => {
                warn!("No audit directory configured; audit trail is in memory only");
                Arc::new(InMemoryAuditStore::new())
            }
        };
        Self::with_audit_store(config, audit_store, time_source)
    }

    /// Builds the container around an already opened audit store.
    ///
    /// `config.audit.data_dir` is ignored.
    pub fn with_audit_store(
        config: RegistryConfig,
        audit_store: Arc<dyn AuditStore>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, ContainerError> {
        config.validate()?;

        let hierarchy = Arc::new(HierarchyStore::with_time_source(Arc::clone(&time_source)));
        let authorizer = Arc::new(ActionAuthorizer::with_time_source(
            hierarchy.clone(),
            Arc::new(Secp256k1Recovery::new()),
            config.security.freshness_window(),
            Arc::clone(&time_source),
        ));
        let ledger = Arc::new(InMemoryLedger::new());
        let orchestrator = Arc::new(LedgerOrchestrator::with_time_source(
            ledger.clone(),
            config.ledger.orchestrator(),
            Arc::clone(&time_source),
        ));
        let recorder = Arc::new(AuditRecorder::with_time_source(
            audit_store,
            config.audit.append_attempts,
            Arc::clone(&time_source),
        ));
        let content = Arc::new(InMemoryContentStore::new());
        let bus = Arc::new(InMemoryEventBus::new());

        let workflow = Arc::new(ProjectWorkflow::new(
            WorkflowDeps {
                hierarchy: hierarchy.clone(),
                authorizer: authorizer.clone(),
                ledger: orchestrator.clone(),
                recorder: recorder.clone(),
                content: content.clone(),
                publisher: bus.clone(),
                time_source,
            },
            config.workflow(),
        ));

        info!("All components initialized");
        Ok(Self {
            config,
            hierarchy,
            authorizer,
            ledger,
            orchestrator,
            recorder,
            workflow,
            content,
            bus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = RegistryConfig::default();
        config.ledger.poll_interval_ms = 0;
        assert!(matches!(
            RegistryContainer::new(config),
            Err(ContainerError::Config(ConfigError::Zero(_)))
        ));
    }

    #[test]
    fn test_opens_file_audit_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RegistryConfig::default();
        config.audit.data_dir = Some(dir.path().to_path_buf());
        let container = RegistryContainer::new(config).unwrap();
        assert_eq!(container.workflow.backlog_len(), 0);
    }

    #[test]
    fn test_injected_audit_store_is_used() {
        let store = Arc::new(InMemoryAuditStore::new());
        store.set_unavailable(true);
        let container = RegistryContainer::with_audit_store(
            RegistryConfig::default(),
            store.clone(),
            Arc::new(SystemTimeSource),
        )
        .unwrap();
        assert_eq!(store.total_entries(), 0);
        assert_eq!(container.config.audit.append_attempts, 3);
    }
}
