//! Corroboration core: per-entity winner decision and staleness sweeps.
//!
//! # Invariants
//! - Both operations run inside a transaction owned by the caller.
//! - After either operation, each entity has at most one active edge.

pub mod engine;
pub mod staleness;

pub use engine::{corroborate, decide, Outcome};
pub use staleness::mark_stale;
