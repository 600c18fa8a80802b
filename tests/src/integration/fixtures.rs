//! # Registry Harness
//!
//! A registry with one branch of the hierarchy already in place:
//!
//! ```text
//! NCCR (root)
//! ├── PANCHAYAT-KL (local authority, region KL)
//! │   └── S1 (subject, region KL)
//! └── NGO-1 (verifier, linked to S1)
//! ```
//!
//! Each organization has one member holding an `OfflineSigner`. Time is a
//! `MockTimeSource`; tests that wait on the ledger run with paused tokio time.

use std::sync::Arc;

use bc_01_hierarchy::{AssignMode, Permissions};
use bc_04_project_workflow::{ProjectRecord, SubmitProject};
use bc_05_ledger_orchestrator::InMemoryLedger;
use bc_06_audit_recorder::{AuditStore, InMemoryAuditStore};
use registry_runtime::handlers::OfflineSigner;
use registry_runtime::{OrgRegistration, RegistryConfig, RegistryContainer, RegistryService};
use shared_types::clock::MockTimeSource;
use shared_types::{
    LinkId, OrgId, ProjectId, ProposedAction, RegionCode, SignedAction, TimeSource, Timestamp,
};

pub const NOW: Timestamp = 1_700_000_000_000;

pub fn org(id: &str) -> OrgId {
    OrgId::parse(id).unwrap()
}

pub fn p1() -> ProjectId {
    ProjectId::parse("P1").unwrap()
}

fn signer(seed: u8) -> OfflineSigner {
    OfflineSigner::from_secret_hex(&hex_secret(seed)).unwrap()
}

fn hex_secret(seed: u8) -> String {
    format!("{:02x}", seed).repeat(32)
}

pub struct Registry {
    pub service: RegistryService,
    pub clock: Arc<MockTimeSource>,
    pub ledger: Arc<InMemoryLedger>,
    pub audit_store: Arc<InMemoryAuditStore>,
    /// S1 to NGO-1, once `link_ngo` ran.
    pub link: Option<LinkId>,
    pub nccr: OfflineSigner,
    pub panchayat: OfflineSigner,
    pub ngo: OfflineSigner,
    pub community: OfflineSigner,
}

pub fn registry() -> Registry {
    let mut config = RegistryConfig::default();
    config.ledger.poll_interval_ms = 100;
    config.ledger.submit_backoff_ms = 50;
    config.ledger.confirmation_timeout_ms = 2_000;

    let clock = Arc::new(MockTimeSource::new(NOW));
    let audit_store = Arc::new(InMemoryAuditStore::new());
    let container = RegistryContainer::with_audit_store(
        config,
        Arc::clone(&audit_store) as Arc<dyn AuditStore>,
        clock.clone(),
    )
    .unwrap();
    let ledger = container.ledger.clone();
    let service = RegistryService::new(Arc::new(container));

    let region = RegionCode::parse("KL").unwrap();
    for registration in [
        OrgRegistration::Root {
            id: org("NCCR"),
            name: "National Centre for Coastal Research".into(),
        },
        OrgRegistration::LocalAuthority {
            id: org("PANCHAYAT-KL"),
            name: "Vypin Panchayat".into(),
            region: region.clone(),
            parent: org("NCCR"),
        },
        OrgRegistration::Verifier {
            id: org("NGO-1"),
            name: "Mangrove Trust".into(),
            parent: org("NCCR"),
        },
        OrgRegistration::Subject {
            id: org("S1"),
            name: "Coastal Village".into(),
            region,
            parent: org("PANCHAYAT-KL"),
        },
    ] {
        service.register_organization(registration).unwrap();
    }

    let nccr = signer(0x11);
    let panchayat = signer(0x22);
    let ngo = signer(0x33);
    let community = signer(0x44);
    for (member, id) in [
        (&nccr, "NCCR"),
        (&panchayat, "PANCHAYAT-KL"),
        (&ngo, "NGO-1"),
        (&community, "S1"),
    ] {
        service.register_member(member.identity().clone(), &org(id)).unwrap();
    }

    Registry {
        service,
        clock,
        ledger,
        audit_store,
        link: None,
        nccr,
        panchayat,
        ngo,
        community,
    }
}

impl Registry {
    /// Links S1 to NGO-1 on behalf of NCCR.
    pub async fn link_ngo(&mut self) {
        let outcome = self
            .service
            .assign_subject_to_verifier(
                self.nccr.identity(),
                &org("S1"),
                &org("NGO-1"),
                Permissions::default(),
                AssignMode::New,
            )
            .await
            .unwrap();
        self.link = Some(outcome.link.id);
    }

    pub async fn submit_p1(&self) -> ProjectRecord {
        self.service
            .submit_project(SubmitProject {
                project_id: p1(),
                subject: org("S1"),
                submitter: self.community.identity().clone(),
                name: "Mangrove belt".into(),
                location: "Vypin".into(),
                area_hectares: 12.5,
                metadata: Some(b"{\"saplings\":4200}".to_vec()),
            })
            .await
            .unwrap()
    }

    pub fn sign(&self, by: &OfflineSigner, action: ProposedAction) -> SignedAction {
        by.sign(action, self.clock.now(), None).unwrap()
    }

    pub fn verify(&self) -> SignedAction {
        self.sign(&self.ngo, ProposedAction::Verify { project_id: p1() })
    }

    pub fn local_approve(&self) -> SignedAction {
        self.sign(&self.panchayat, ProposedAction::LocalApprove { project_id: p1() })
    }

    pub fn final_approve(&self, credit_amount: u64) -> SignedAction {
        self.sign(
            &self.nccr,
            ProposedAction::FinalApprove {
                project_id: p1(),
                credit_amount,
            },
        )
    }
}
