//! # Canonical Message
//!
//! Deterministic, human-readable signing payloads.
//!
//! ```text
//! Blue Carbon Registry - Signed Action
//! version: 1
//! action: finalApprove
//! project: P1
//! signer: 0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed
//! timestamp: 1700000000000
//! nonce: 7f3c2a91-nonce
//! credit-amount: 1000
//! metadata-sha256: none
//! ```
//!
//! Lines are joined with `\n` and there is no trailing newline. Field order
//! is fixed per action type, and values are escaped so that no field can
//! inject a line of its own.

use shared_types::{Nonce, ProposedAction, SignedAction, SignerIdentity, Timestamp};

/// First line of every signed message.
pub const MESSAGE_HEADER: &str = "Blue Carbon Registry - Signed Action";

/// Message layout version.
pub const MESSAGE_VERSION: u32 = 1;

/// Stateless builder/validator for signed-action payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureCodec;

impl SignatureCodec {
    /// Builds the canonical message for `action`.
    ///
    /// The same inputs always yield byte-identical output.
    pub fn build_message(
        action: &ProposedAction,
        signer: &SignerIdentity,
        timestamp: Timestamp,
        nonce: &Nonce,
        metadata_digest: Option<&str>,
    ) -> String {
        let mut lines = vec![
            MESSAGE_HEADER.to_string(),
            field("version", &MESSAGE_VERSION.to_string()),
            field("action", action.action_type().wire_name()),
            field("project", action.project_id().as_str()),
            field("signer", signer.as_str()),
            field("timestamp", &timestamp.to_string()),
            field("nonce", nonce.as_str()),
        ];
        match action {
            ProposedAction::Verify { .. } | ProposedAction::LocalApprove { .. } => {}
            ProposedAction::FinalApprove { credit_amount, .. } => {
                lines.push(field("credit-amount", &credit_amount.to_string()));
            }
            ProposedAction::Reject { reason, .. } => {
                lines.push(field("reason", reason));
            }
        }
        lines.push(field("metadata-sha256", metadata_digest.unwrap_or("none")));
        lines.join("\n")
    }

    /// Rebuilds the message a `SignedAction` should have been signed over.
    pub fn message_for(signed: &SignedAction) -> String {
        let digest = signed.metadata_digest();
        Self::build_message(
            &signed.action,
            &signed.signer,
            signed.timestamp,
            &signed.nonce,
            digest.as_deref(),
        )
    }
}

fn field(name: &str, value: &str) -> String {
    format!("{name}: {}", escape(value))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ProjectId;

    fn signer() -> SignerIdentity {
        SignerIdentity::parse("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap()
    }

    fn nonce() -> Nonce {
        Nonce::parse("nonce-0001").unwrap()
    }

    #[test]
    fn test_final_approve_layout() {
        let action = ProposedAction::FinalApprove {
            project_id: ProjectId::parse("P1").unwrap(),
            credit_amount: 1000,
        };
        let msg = SignatureCodec::build_message(&action, &signer(), 1_700_000_000_000, &nonce(), None);
        assert_eq!(
            msg,
            "Blue Carbon Registry - Signed Action\n\
             version: 1\n\
             action: finalApprove\n\
             project: P1\n\
             signer: 0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed\n\
             timestamp: 1700000000000\n\
             nonce: nonce-0001\n\
             credit-amount: 1000\n\
             metadata-sha256: none"
        );
    }

    #[test]
    fn test_deterministic() {
        let action = ProposedAction::Verify {
            project_id: ProjectId::parse("P1").unwrap(),
        };
        let a = SignatureCodec::build_message(&action, &signer(), 42, &nonce(), Some("ab"));
        let b = SignatureCodec::build_message(&action.clone(), &signer(), 42, &nonce(), Some("ab"));
        assert_eq!(a, b);
        assert_ne!(
            a,
            SignatureCodec::build_message(&action, &signer(), 43, &nonce(), Some("ab"))
        );
    }

    #[test]
    fn test_reason_cannot_forge_lines() {
        let action = ProposedAction::Reject {
            project_id: ProjectId::parse("P1").unwrap(),
            reason: "bad data\ncredit-amount: 999\\".into(),
        };
        let msg = SignatureCodec::build_message(&action, &signer(), 1, &nonce(), None);
        assert_eq!(msg.lines().count(), 9);
        assert!(msg.contains("reason: bad data\\ncredit-amount: 999\\\\"));
        assert!(!msg.lines().any(|l| l.starts_with("credit-amount")));
    }
}
