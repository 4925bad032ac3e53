//! Fact data model shared by grounding, projection and corroboration.
//!
//! # Responsibility
//! - Define the claim/plain field split of extracted fact trees.
//! - Define provenance stamps and store-facing entity/assertion records.
//!
//! # Invariants
//! - Claims are the only fields that carry evidence.
//! - Every entity is identified by `(label, natural_key)`.

pub mod claim;
pub mod entity;
pub mod provenance;
pub mod schema;
