//! # Core Domain Entities
//!
//! Identifiers, workflow stages, action types and roles.
//!
//! ## Clusters
//!
//! - **Identity**: `ProjectId`, `OrgId`, `LinkId`, `RegionCode`, `SignerIdentity`, `Nonce`
//! - **Workflow**: `Stage`, `ActionType`
//! - **Authority**: `Role`, `RequiredRole`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IdentifierError;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Maximum length of any textual identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Nonces shorter than this are too guessable to act as replay tokens.
pub const MIN_NONCE_LEN: usize = 8;

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if let Some(c) = value.chars().find(|c| !is_identifier_char(*c)) {
        return Err(IdentifierError::InvalidCharacter { kind, found: c });
    }
    Ok(())
}

/// Declares a validated string identifier.
///
/// Identifiers are restricted to `[A-Za-z0-9._:-]` so they can be embedded in
/// signed messages and log lines verbatim.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps an identifier.
            pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                check_identifier($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_identifier!(
    /// Stable external identifier of a restoration project.
    ProjectId,
    "project id"
);

string_identifier!(
    /// Identifier of an organization in the hierarchy.
    OrgId,
    "organization id"
);

string_identifier!(
    /// Identifier of a verifier/subject link.
    LinkId,
    "link id"
);

string_identifier!(
    /// Administrative region a local authority and its subjects belong to.
    RegionCode,
    "region code"
);

/// An Ethereum-style account address acting as a signer.
///
/// Always stored lower-cased with a `0x` prefix so that comparisons are
/// byte-for-byte and checksum casing never causes a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignerIdentity(String);

impl SignerIdentity {
    /// Parses `0x` followed by 40 hex characters, normalising case.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let value = value.as_ref();
        let hex_part = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or(IdentifierError::InvalidAddress)?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdentifierError::InvalidAddress);
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    /// Builds the identity from a raw 20-byte address.
    pub fn from_address(address: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(address)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SignerIdentity {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SignerIdentity> for String {
    fn from(id: SignerIdentity) -> String {
        id.0
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-chosen replay token, unique per signer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.len() < MIN_NONCE_LEN || value.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::NonceLength {
                min: MIN_NONCE_LEN,
                max: MAX_IDENTIFIER_LEN,
            });
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdentifierError::InvalidCharacter {
                kind: "nonce",
                found: c,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nonce {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> String {
        nonce.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER B: WORKFLOW
// =============================================================================

/// Position of a project in the approval state machine.
///
/// ```text
/// Submitted ──verify──→ NgoVerified ──localApprove──→ LocalApproved ──finalApprove──→ Minted
///     │                     │                              │
///     └───────reject────────┴────────────reject────────────┴──→ Rejected
/// ```
///
/// `Minted` is the "finally approved" stage: final approval and credit
/// issuance are committed by one ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Submitted,
    #[serde(rename = "ngoVerified")]
    NgoVerified,
    LocalApproved,
    Minted,
    Rejected,
}

impl Stage {
    /// Terminal stages accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Minted | Stage::Rejected)
    }

    /// Stage reached by applying `action` from this stage, if the guard holds.
    pub fn next_for(&self, action: ActionType) -> Option<Stage> {
        match (self, action) {
            (Stage::Submitted, ActionType::Verify) => Some(Stage::NgoVerified),
            (Stage::NgoVerified, ActionType::LocalApprove) => Some(Stage::LocalApproved),
            (Stage::LocalApproved, ActionType::FinalApprove) => Some(Stage::Minted),
            (stage, ActionType::Reject) if !stage.is_terminal() => Some(Stage::Rejected),
            _ => None,
        }
    }

    /// Check if a transition to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        matches!(
            (self, target),
            (Stage::Submitted, Stage::NgoVerified)
                | (Stage::NgoVerified, Stage::LocalApproved)
                | (Stage::LocalApproved, Stage::Minted)
                | (Stage::Submitted, Stage::Rejected)
                | (Stage::NgoVerified, Stage::Rejected)
                | (Stage::LocalApproved, Stage::Rejected)
        )
    }

    /// Position in the forward sequence. `Rejected` sits outside it.
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            Stage::Submitted => Some(0),
            Stage::NgoVerified => Some(1),
            Stage::LocalApproved => Some(2),
            Stage::Minted => Some(3),
            Stage::Rejected => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Submitted => "Submitted",
            Stage::NgoVerified => "NGOVerified",
            Stage::LocalApproved => "LocalApproved",
            Stage::Minted => "FinallyApproved(Minted)",
            Stage::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of stage transition a signer may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Verify,
    LocalApprove,
    FinalApprove,
    Reject,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Verify,
        ActionType::LocalApprove,
        ActionType::FinalApprove,
        ActionType::Reject,
    ];

    /// Stage the project must be in. `None` for `reject`, which applies to
    /// any non-terminal stage.
    pub fn required_stage(&self) -> Option<Stage> {
        match self {
            ActionType::Verify => Some(Stage::Submitted),
            ActionType::LocalApprove => Some(Stage::NgoVerified),
            ActionType::FinalApprove => Some(Stage::LocalApproved),
            ActionType::Reject => None,
        }
    }

    /// Stable wire name, also used inside signed messages.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActionType::Verify => "verify",
            ActionType::LocalApprove => "localApprove",
            ActionType::FinalApprove => "finalApprove",
            ActionType::Reject => "reject",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// =============================================================================
// CLUSTER C: AUTHORITY
// =============================================================================

/// Role a signer holds by virtue of its organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "region", rename_all = "camelCase")]
pub enum Role {
    NationalAuthority,
    LocalAuthority(RegionCode),
    Verifier,
    Subject,
}

impl Role {
    pub fn is_authority(&self) -> bool {
        matches!(self, Role::NationalAuthority | Role::LocalAuthority(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::NationalAuthority => f.write_str("national-authority"),
            Role::LocalAuthority(region) => write!(f, "local-authority({region})"),
            Role::Verifier => f.write_str("verifier"),
            Role::Subject => f.write_str("subject"),
        }
    }
}

/// Role an action demands, reported back when a signer falls short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "required", content = "region", rename_all = "camelCase")]
pub enum RequiredRole {
    /// The verifier actively linked to the project's subject.
    LinkedVerifier,
    /// Local authority scoped to the subject's region.
    LocalAuthority(RegionCode),
    NationalAuthority,
    /// Any authority over the subject, or its linked verifier.
    ProjectOverseer,
    /// An authority able to manage links.
    Authority,
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredRole::LinkedVerifier => f.write_str("verifier linked to the subject"),
            RequiredRole::LocalAuthority(region) => {
                write!(f, "local-authority role for region {region}")
            }
            RequiredRole::NationalAuthority => f.write_str("national-authority role"),
            RequiredRole::ProjectOverseer => {
                f.write_str("authority or linked verifier over the project")
            }
            RequiredRole::Authority => f.write_str("authority role"),
        }
    }
}
