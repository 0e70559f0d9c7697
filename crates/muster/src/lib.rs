//! # Muster - Cluster Bootstrap Coordinator
//!
//! Lets N freshly launched, mutually unaware machines discover each other,
//! agree on membership and a shared secret, elect the node that seeds the
//! secret, and launch a long-running clustered agent - using nothing but one
//! unreliable, eventually-available arbitration endpoint as a shared
//! blackboard.
//!
//! ## Architecture
//! ```text
//! bootstrap -> arbitration -> blackboard -> (arbitration endpoint)
//!     |
//!     +-> supervisor (owns the agent process for the node's lifetime)
//! ```
//!
//! Everything is polling, idempotent writes, and sleep-based backoff: the
//! consensus layer is exactly what is being assembled, so none is available
//! during bootstrap.

pub mod arbiter;
pub mod arbitration;
pub mod artifact;
pub mod blackboard;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod identity;
pub mod replica;
pub mod secret;
pub mod supervisor;
