//! hybrid-core - Core types and traits for hybrid retrieval
//!
//! This crate provides the domain types, collaborator traits, error handling
//! and configuration shared by the hybrid rank-fusion retrieval crates.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, RetrievalError};
pub use traits::*;
pub use types::*;
