//! # Registry Events
//!
//! Facts the registry publishes after they happen. Events are
//! notifications only: the audit trail stays the source of truth.

use serde::{Deserialize, Serialize};
use shared_types::{ActionType, LinkId, OrgId, ProjectId, SignerIdentity, Stage};

/// All events that flow through the registry bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    // =========================================================================
    // PROJECT LIFECYCLE (Component 04)
    // =========================================================================
    /// A subject registered a new project at `Submitted`.
    #[serde(rename_all = "camelCase")]
    ProjectSubmitted {
        project_id: ProjectId,
        subject: OrgId,
        submitter: SignerIdentity,
    },

    /// A transition was confirmed on the ledger and committed.
    #[serde(rename_all = "camelCase")]
    StageCommitted {
        project_id: ProjectId,
        from: Stage,
        to: Stage,
        action: ActionType,
        signer: SignerIdentity,
        ledger_tx: String,
    },

    /// The ledger reverted a transition; the stage is unchanged.
    #[serde(rename_all = "camelCase")]
    TransitionReverted {
        project_id: ProjectId,
        action: ActionType,
        reason: String,
        ledger_tx: String,
    },

    /// Credits were issued by a final approval.
    #[serde(rename_all = "camelCase")]
    CreditsMinted {
        project_id: ProjectId,
        credit_amount: u64,
        token_id: Option<String>,
        content_locator: Option<String>,
    },

    // =========================================================================
    // HIERARCHY (Component 01)
    // =========================================================================
    #[serde(rename_all = "camelCase")]
    LinkAssigned {
        link_id: LinkId,
        subject: OrgId,
        verifier: OrgId,
        replaced: Option<LinkId>,
    },

    #[serde(rename_all = "camelCase")]
    LinkRevoked {
        link_id: LinkId,
        subject: OrgId,
        verifier: OrgId,
    },

    // =========================================================================
    // AUDIT (Component 06)
    // =========================================================================
    /// A committed transition could not be audited and awaits reconciliation.
    #[serde(rename_all = "camelCase")]
    AuditBacklogged {
        project_id: ProjectId,
        backlog_len: usize,
    },
}

impl RegistryEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ProjectSubmitted { .. }
            | Self::StageCommitted { .. }
            | Self::TransitionReverted { .. } => EventTopic::Projects,
            Self::CreditsMinted { .. } => EventTopic::Credits,
            Self::LinkAssigned { .. } | Self::LinkRevoked { .. } => EventTopic::Hierarchy,
            Self::AuditBacklogged { .. } => EventTopic::Audit,
        }
    }

    /// Component number that emitted this event.
    #[must_use]
    pub fn source_component(&self) -> u8 {
        match self {
            Self::LinkAssigned { .. } | Self::LinkRevoked { .. } => 1,
            Self::ProjectSubmitted { .. }
            | Self::StageCommitted { .. }
            | Self::TransitionReverted { .. }
            | Self::CreditsMinted { .. } => 4,
            Self::AuditBacklogged { .. } => 6,
        }
    }

    /// Project this event concerns, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::ProjectSubmitted { project_id, .. }
            | Self::StageCommitted { project_id, .. }
            | Self::TransitionReverted { project_id, .. }
            | Self::CreditsMinted { project_id, .. }
            | Self::AuditBacklogged { project_id, .. } => Some(project_id),
            Self::LinkAssigned { .. } | Self::LinkRevoked { .. } => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Submissions, commits and reverts.
    Projects,
    /// Credit issuance.
    Credits,
    /// Link assignment and revocation.
    Hierarchy,
    /// Audit backlog alerts.
    Audit,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to one project. Events without a project never match.
    pub project: Option<ProjectId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            project: None,
        }
    }

    /// Create a filter for every event about one project.
    #[must_use]
    pub fn for_project(project: ProjectId) -> Self {
        Self {
            topics: Vec::new(),
            project: Some(project),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &RegistryEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let project_match = match &self.project {
            None => true,
            Some(project) => event.project_id() == Some(project),
        };

        topic_match && project_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minted(project: &str) -> RegistryEvent {
        RegistryEvent::CreditsMinted {
            project_id: ProjectId::parse(project).unwrap(),
            credit_amount: 1000,
            token_id: Some("1".into()),
            content_locator: None,
        }
    }

    fn revoked() -> RegistryEvent {
        RegistryEvent::LinkRevoked {
            link_id: LinkId::parse("link-000001").unwrap(),
            subject: OrgId::parse("S1").unwrap(),
            verifier: OrgId::parse("NGO-1").unwrap(),
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(minted("P1").topic(), EventTopic::Credits);
        assert_eq!(minted("P1").source_component(), 4);
        assert_eq!(revoked().topic(), EventTopic::Hierarchy);
        assert_eq!(revoked().source_component(), 1);
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&minted("P1")));
        assert!(filter.matches(&revoked()));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Hierarchy]);
        assert!(filter.matches(&revoked()));
        assert!(!filter.matches(&minted("P1")));
    }

    #[test]
    fn test_filter_by_project() {
        let filter = EventFilter::for_project(ProjectId::parse("P1").unwrap());
        assert!(filter.matches(&minted("P1")));
        assert!(!filter.matches(&minted("P2")));
        assert!(!filter.matches(&revoked()));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(minted("P1")).unwrap();
        assert_eq!(json["type"], "creditsMinted");
        assert_eq!(json["creditAmount"], 1000);
    }
}
