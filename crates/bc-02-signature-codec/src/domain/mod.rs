//! # Domain Layer
//!
//! Message building and format validation, with no I/O.

pub mod errors;
pub mod format;
pub mod message;
