//! # Domain Layer

pub mod entities;
pub mod errors;
