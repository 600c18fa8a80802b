//! # Shared Bus - Registry Event Bus
//!
//! Components publish facts after they commit them; observers (dashboards,
//! notifiers) subscribe by topic or project.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Workflow /   │                    │  Observer    │
//! │ Hierarchy    │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Events are notifications only. A dropped or lagged event never affects
//! registry state; the audit trail is the record of what happened.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, RegistryEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
