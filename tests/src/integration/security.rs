//! # Signed-Action Gatekeeping
//!
//! Every rejection here must leave the project stage, the ledger and the
//! audit trail untouched.

use bc_02_signature_codec::SignatureCodec;
use bc_05_ledger_orchestrator::LedgerBehaviour;
use shared_types::{ErrorKind, ProposedAction, Stage, TimeSource};

use super::fixtures::{p1, registry, Registry};

async fn assert_untouched(r: &Registry, stage: Stage, history_len: usize) {
    assert_eq!(r.service.get_project_state(&p1()).unwrap().stage, stage);
    assert_eq!(r.service.get_history(&p1()).await.unwrap().len(), history_len);
}

#[tokio::test(start_paused = true)]
async fn test_tampered_payload_is_refused() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.service.propose_transition(r.verify()).await.unwrap();
    r.service.propose_transition(r.local_approve()).await.unwrap();
    let sends = r.ledger.send_count();

    // Edited amount, message left as signed.
    let mut edited = r.final_approve(100);
    edited.action = ProposedAction::FinalApprove {
        project_id: p1(),
        credit_amount: 1_000_000,
    };
    let err = r.service.propose_transition(edited.clone()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidSignatureFormat);

    // Edited amount with a rebuilt message recovers some other signer.
    edited.canonical_message = SignatureCodec::message_for(&edited);
    let err = r.service.propose_transition(edited).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::SignerMismatch);

    let mut garbage = r.final_approve(100);
    garbage.signature = "0x1234".into();
    let err = r.service.propose_transition(garbage).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidSignatureFormat);

    assert_eq!(r.ledger.send_count(), sends);
    assert_untouched(&r, Stage::LocalApproved, 2).await;

    let honest = r.service.propose_transition(r.final_approve(100)).await.unwrap();
    assert_eq!(honest.project.credits_minted, Some(100));
}

#[tokio::test(start_paused = true)]
async fn test_stale_and_future_timestamps() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let old = r.verify();
    r.clock.advance(301_000);
    let err = r.service.propose_transition(old).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StaleTimestamp);

    let ahead = r
        .ngo
        .sign(ProposedAction::Verify { project_id: p1() }, r.clock.now() + 60_000, None)
        .unwrap();
    let err = r.service.propose_transition(ahead).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StaleTimestamp);

    assert_untouched(&r, Stage::Submitted, 0).await;
    assert_eq!(r.ledger.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_replayed_action_is_nonce_reused() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let verify = r.verify();
    r.service.propose_transition(verify.clone()).await.unwrap();
    let err = r.service.propose_transition(verify).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NonceReused);
    assert_untouched(&r, Stage::NgoVerified, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_revoked_link_blocks_verification() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;

    let link = r.link.clone().unwrap();
    let err = r.service.revoke_link(&link, r.ngo.identity()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAuthority);

    let revoked = r.service.revoke_link(&link, r.nccr.identity()).await.unwrap();
    assert!(!revoked.is_active());

    let err = r.service.propose_transition(r.verify()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotLinked);
    assert_untouched(&r, Stage::Submitted, 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_wrong_role_is_not_authority() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.service.propose_transition(r.verify()).await.unwrap();

    let by_community = r.sign(&r.community, ProposedAction::LocalApprove { project_id: p1() });
    let err = r.service.propose_transition(by_community).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAuthority);
    assert_untouched(&r, Stage::NgoVerified, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_proposals_commit_once() {
    let mut r = registry();
    r.link_ngo().await;
    r.submit_p1().await;
    r.ledger.set_behaviour(LedgerBehaviour::ConfirmAfter(2));

    let (a, b) = tokio::join!(
        r.service.propose_transition(r.verify()),
        r.service.propose_transition(r.verify())
    );
    let kinds: Vec<Option<ErrorKind>> = [a, b].into_iter().map(|res| res.err().map(|e| e.kind)).collect();
    assert!(kinds.contains(&None));
    assert!(kinds.contains(&Some(ErrorKind::TransitionInProgress)));
    assert_eq!(r.ledger.send_count(), 1);
    assert_untouched(&r, Stage::NgoVerified, 1).await;
}
