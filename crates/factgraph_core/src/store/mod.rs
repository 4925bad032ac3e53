//! Transactional property store contract.
//!
//! # Responsibility
//! - Define the store operations corroboration, staleness and inference need.
//! - Keep SQL details inside the SQLite implementation.
//!
//! # Invariants
//! - Callers own the transaction; store methods never commit on their own.
//! - Reads expecting at most one match fail loudly on more than one.
//!
//! # See also
//! - `sqlite::SqlitePropertyStore`

use crate::db::DbError;
use crate::inference::InferenceRule;
use crate::model::claim::{EvidenceMap, PropertyMap};
use crate::model::entity::{
    AssertionEdge, AssertionStamp, DerivedRelationship, EntityId, EntityLabel, EntityRecord,
    EntityRef, Relation,
};
use crate::model::provenance::Provenance;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqlitePropertyStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Property store error.
#[derive(Debug)]
pub enum StoreError {
    /// Transport or constraint failure from the backing database.
    Db(DbError),
    /// More than one active assertion edge was found for one entity.
    InvariantViolation {
        entity: EntityRef,
        active_edges: usize,
    },
    /// Persisted data cannot be decoded into a read model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvariantViolation {
                entity,
                active_edges,
            } => write!(
                f,
                "invariant violation: {entity} has {active_edges} competing active assertions"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvariantViolation { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Entity with more than one active assertion, reported by audits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEdgeViolation {
    pub entity: EntityRef,
    pub active_edges: usize,
}

/// Store operations used by the corroboration core.
pub trait PropertyStore {
    /// Creates the source node when absent.
    fn upsert_source(&self, source_id: &str) -> StoreResult<()>;

    /// Creates the entity when absent and returns its id.
    fn upsert_entity(&self, entity: &EntityRef) -> StoreResult<EntityId>;

    /// Returns the active edge of `entity` held by any source other than
    /// `source_id`, or `InvariantViolation` when more than one exists.
    fn find_competing_active(
        &self,
        entity: &EntityRef,
        source_id: &str,
    ) -> StoreResult<Option<AssertionStamp>>;

    /// Overwrites the entity's property snapshot.
    fn replace_entity_properties(
        &self,
        entity_id: EntityId,
        properties: &PropertyMap,
    ) -> StoreResult<()>;

    /// Flips every active edge of the entity to inactive.
    fn deactivate_entity_assertions(&self, entity_id: EntityId) -> StoreResult<usize>;

    /// Writes the `(entity, source)` edge, replacing all prior edge contents.
    fn upsert_assertion(
        &self,
        entity_id: EntityId,
        provenance: &Provenance,
        evidence: &EvidenceMap,
        active: bool,
    ) -> StoreResult<()>;

    /// Flips every active edge from `source_id` on entities of `labels`.
    fn deactivate_source_assertions(
        &self,
        source_id: &str,
        labels: &[EntityLabel],
    ) -> StoreResult<usize>;

    /// Adds a relationship if absent.
    fn merge_link(&self, from: EntityId, relation: Relation, to: EntityId) -> StoreResult<()>;

    /// Replaces every `relation` link of `from` with a single link to `to`.
    fn replace_link(&self, from: EntityId, relation: Relation, to: EntityId) -> StoreResult<()>;

    /// Removes every `relation` link of `from` and returns how many went.
    fn clear_links(&self, from: EntityId, relation: Relation) -> StoreResult<usize>;

    /// Deletes every derived relationship of `kind`.
    fn delete_derived(&self, kind: &str) -> StoreResult<usize>;

    /// Inserts the relationships `rule` yields over active state.
    fn materialize_derived(&self, rule: &InferenceRule) -> StoreResult<usize>;

    fn get_entity(&self, entity: &EntityRef) -> StoreResult<Option<EntityRecord>>;

    /// Returns every source's edge for the entity, oldest retrieval first.
    fn list_assertions(&self, entity: &EntityRef) -> StoreResult<Vec<AssertionEdge>>;

    /// Returns entities of `label` that currently hold an active edge.
    fn list_active_entities(&self, label: EntityLabel) -> StoreResult<Vec<EntityRecord>>;

    fn list_link_targets(
        &self,
        from: &EntityRef,
        relation: Relation,
    ) -> StoreResult<Vec<EntityRef>>;

    fn list_derived(&self, kind: &str) -> StoreResult<Vec<DerivedRelationship>>;

    /// Returns entities violating the at-most-one-active invariant.
    fn find_active_edge_violations(&self) -> StoreResult<Vec<ActiveEdgeViolation>>;
}
