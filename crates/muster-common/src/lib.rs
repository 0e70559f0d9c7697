//! # Muster Common
//!
//! Shared types, errors, and constants used across Muster components.
//!
//! ## Modules
//! - `types` - Core data structures (ClusterDocument, JoinParameters, etc.)
//! - `error` - Common error types
//! - `constants` - Shared protocol constants and poll intervals

pub mod constants;
pub mod error;
pub mod types;

pub use error::MusterError;
pub use types::*;
