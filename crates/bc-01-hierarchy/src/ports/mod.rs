//! # Ports Layer
//!
//! The hierarchy has no outbound dependencies; it only exposes an API.

pub mod inbound;
