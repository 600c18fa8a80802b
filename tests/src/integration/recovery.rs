//! # Ledger and Audit Failures
//!
//! ```text
//! propose ──→ ledger silent ──→ LedgerTimeout ──→ reconcile ──→ committed
//! propose ──→ ledger revert ──→ LedgerReverted (audited, stage kept)
//! propose ──→ audit down ────→ StorageUnavailable ──→ backlog ──→ reconcile
//! ```

use bc_05_ledger_orchestrator::LedgerBehaviour;
use bc_06_audit_recorder::AuditOutcome;
use registry_runtime::ReconcileReport;
use shared_bus::{EventFilter, EventTopic, RegistryEvent};
use shared_types::{ErrorKind, Stage};

use super::fixtures::{p1, registry};

#[tokio::test(start_paused = true)]
async fn test_timeout_then_background_reconcile() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.ledger.set_behaviour(LedgerBehaviour::NeverConfirm);

    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::LedgerTimeout);
    assert!(err.kind.is_retryable());
    assert_eq!(r.service.projects_needing_reconciliation(), vec![p1()]);

    // Another action cannot overtake the unconfirmed one.
    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::TransitionInProgress);

    let report = r.service.reconcile_all().await.unwrap();
    assert_eq!(report.still_pending, vec![p1()]);
    assert!(report.settled.is_empty());

    let awaiting = r
        .service
        .get_project_state(&p1())
        .unwrap()
        .awaiting_confirmation
        .unwrap();
    r.ledger
        .resolve(&awaiting.pending.tx_hash, LedgerBehaviour::ConfirmAfter(0));

    let report = r.service.reconcile_all().await.unwrap();
    assert_eq!(report.settled, vec![p1()]);
    assert!(r.service.projects_needing_reconciliation().is_empty());

    let project = r.service.get_project_state(&p1()).unwrap();
    assert_eq!(project.stage, Stage::NgoVerified);
    assert!(project.awaiting_confirmation.is_none());
    assert_eq!(r.service.get_history(&p1()).await.unwrap().len(), 1);
    assert_eq!(r.ledger.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_revert_is_recorded_and_stage_kept() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    let mut projects = r
        .service
        .subscribe(EventFilter::topics(vec![EventTopic::Projects]));
    r.ledger
        .set_behaviour(LedgerBehaviour::RevertAfter(1, "registry paused".into()));

    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::LedgerReverted);
    assert!(err.message.contains("registry paused"));

    let history = r.service.get_history(&p1()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].outcome,
        AuditOutcome::Reverted {
            reason: "registry paused".into()
        }
    );
    assert_eq!(history[0].resulting_stage, Stage::Submitted);
    assert_eq!(r.service.get_project_state(&p1()).unwrap().stage, Stage::Submitted);
    assert!(matches!(
        projects.recv().await,
        Some(RegistryEvent::TransitionReverted { .. })
    ));

    r.ledger.set_behaviour(LedgerBehaviour::ConfirmAfter(0));
    let outcome = r.service.propose_transition(r.verify()).await.unwrap();
    assert_eq!(outcome.project.stage, Stage::NgoVerified);
    assert_eq!(outcome.audit_sequence, 2);
}

#[tokio::test(start_paused = true)]
async fn test_audit_outage_backlogs_until_reconciled() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    let mut alerts = r.service.subscribe(EventFilter::topics(vec![EventTopic::Audit]));

    r.audit_store.set_unavailable(true);
    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StorageUnavailable);

    let project = r.service.get_project_state(&p1()).unwrap();
    assert_eq!(project.stage, Stage::NgoVerified);
    assert!(project.needs_reconciliation);
    assert!(matches!(
        alerts.recv().await,
        Some(RegistryEvent::AuditBacklogged { backlog_len: 1, .. })
    ));

    let err = r.service.propose_transition(r.local_approve()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StorageUnavailable);
    assert!(r.service.reconcile_all().await.is_err());

    r.audit_store.set_unavailable(false);
    let report = r.service.reconcile_all().await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            audit_appended: 1,
            ..ReconcileReport::default()
        }
    );
    assert!(!r.service.get_project_state(&p1()).unwrap().needs_reconciliation);

    r.service.propose_transition(r.local_approve()).await.unwrap();
    let sequences: Vec<u64> = r
        .service
        .get_history(&p1())
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_send_failures_are_retried() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.ledger.fail_next_sends(2);

    let outcome = r.service.propose_transition(r.verify()).await.unwrap();
    assert_eq!(outcome.project.stage, Stage::NgoVerified);
    assert_eq!(r.ledger.send_count(), 3);
}
