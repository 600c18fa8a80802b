//! # Submission to Issuance
//!
//! ```text
//! Submitted ──verify──→ NgoVerified ──localApprove──→ LocalApproved ──finalApprove──→ Minted
//!     └────────────────────────── reject ─────────────────────────────→ Rejected
//! ```

use bc_04_project_workflow::LOCATOR_SCHEME;
use bc_06_audit_recorder::AuditOutcome;
use registry_runtime::handlers::handle_line;
use shared_bus::{EventFilter, EventTopic, RegistryEvent};
use shared_types::{ActionType, ErrorKind, ProposedAction, Stage};

use super::fixtures::{org, p1, registry};

#[tokio::test(start_paused = true)]
async fn test_happy_path_mints_and_audits_every_step() {
    let mut r = registry();
    r.link_ngo().await;
    let submitted = r.submit_p1().await;
    assert_eq!(submitted.stage, Stage::Submitted);
    let submission_locator = submitted.content_locator.clone().unwrap();
    assert!(submission_locator.starts_with(LOCATOR_SCHEME));

    let mut minted_events = r
        .service
        .subscribe(EventFilter::topics(vec![EventTopic::Credits]));

    let verified = r.service.propose_transition(r.verify()).await.unwrap();
    assert_eq!(verified.project.stage, Stage::NgoVerified);
    let approved = r.service.propose_transition(r.local_approve()).await.unwrap();
    assert_eq!(approved.project.stage, Stage::LocalApproved);
    let minted = r.service.propose_transition(r.final_approve(1_000)).await.unwrap();

    let project = r.service.get_project_state(&p1()).unwrap();
    assert_eq!(project.stage, Stage::Minted);
    assert_eq!(project.credits_minted, Some(1_000));
    assert!(project.token_id.is_some());
    assert!(r.ledger.is_minted(&project.ledger_ref));
    let certificate_locator = project.content_locator.clone().unwrap();
    assert_ne!(certificate_locator, submission_locator);

    let history = r.service.get_history(&p1()).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        history.iter().map(|e| e.action.action_type()).collect::<Vec<_>>(),
        vec![ActionType::Verify, ActionType::LocalApprove, ActionType::FinalApprove]
    );
    assert!(history.iter().all(|e| e.outcome == AuditOutcome::Committed));
    assert_eq!(history[2].sequence, minted.audit_sequence);
    assert_eq!(history[2].content_locator.as_deref(), Some(certificate_locator.as_str()));

    let certificate = r.service.issuance_certificate(&p1()).await.unwrap().unwrap();
    assert_eq!(certificate.credit_amount, 1_000);
    assert_eq!(&certificate.approved_by, r.nccr.identity());
    assert_eq!(certificate.submission_locator, Some(submission_locator));

    match minted_events.recv().await {
        Some(RegistryEvent::CreditsMinted { credit_amount, .. }) => assert_eq!(credit_amount, 1_000),
        other => panic!("expected CreditsMinted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_minted_project_is_final() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.service.propose_transition(r.verify()).await.unwrap();
    r.service.propose_transition(r.local_approve()).await.unwrap();
    r.service.propose_transition(r.final_approve(750)).await.unwrap();
    let sends = r.ledger.send_count();

    let again = r.service.propose_transition(r.final_approve(9_999)).await.unwrap_err();
    assert_eq!(again.kind, ErrorKind::AlreadyFinal);

    let reject = r.sign(
        &r.nccr,
        ProposedAction::Reject {
            project_id: p1(),
            reason: "late objection".into(),
        },
    );
    let err = r.service.propose_transition(reject).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyFinal);

    let project = r.service.get_project_state(&p1()).unwrap();
    assert_eq!(project.credits_minted, Some(750));
    assert_eq!(r.ledger.send_count(), sends);
    assert_eq!(r.service.get_history(&p1()).await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_approval_is_wrong_stage() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let err = r.service.propose_transition(r.local_approve()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::WrongStage);
    let err = r.service.propose_transition(r.final_approve(10)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::WrongStage);

    assert_eq!(r.service.get_project_state(&p1()).unwrap().stage, Stage::Submitted);
    assert!(r.service.get_history(&p1()).await.unwrap().is_empty());
    assert_eq!(r.ledger.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_verifier_rejects_and_project_archives() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let reject = r.sign(
        &r.ngo,
        ProposedAction::Reject {
            project_id: p1(),
            reason: "plots under water".into(),
        },
    );
    let outcome = r.service.propose_transition(reject).await.unwrap();
    assert_eq!(outcome.project.stage, Stage::Rejected);
    assert_eq!(outcome.project.rejection_reason.as_deref(), Some("plots under water"));

    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyFinal);
    assert_eq!(r.service.list_projects(Some(&org("S1"))).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rpc_line_drives_the_same_workflow() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let request = serde_json::json!({
        "id": 42,
        "method": "proposeTransition",
        "params": r.verify(),
    });
    let response: serde_json::Value =
        serde_json::from_str(&handle_line(&r.service, &request.to_string()).await).unwrap();
    assert_eq!(response["id"], 42);
    assert_eq!(response["ok"]["project"]["stage"], "ngoVerified");

    let line = r#"{"id":43,"method":"getHistory","params":{"projectId":"P1"}}"#;
    let response: serde_json::Value =
        serde_json::from_str(&handle_line(&r.service, line).await).unwrap();
    assert_eq!(response["ok"].as_array().map(Vec::len), Some(1));
}
