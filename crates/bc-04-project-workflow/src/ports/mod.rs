//! # Ports Layer

pub mod inbound;
pub mod outbound;
