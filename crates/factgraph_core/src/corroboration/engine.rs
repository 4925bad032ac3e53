//! Versioned winner-take-all corroboration.
//!
//! # Responsibility
//! - Decide whether a new assertion displaces the entity's active one.
//! - Keep one audit edge per `(entity, source)` whichever way it goes.
//!
//! # Invariants
//! - A newer `retrieved_at` from another source always wins.
//! - Trust only breaks exact timestamp ties; ties at equal trust go to the newcomer.
//! - A losing assertion never touches the snapshot or the active edge.

use crate::model::claim::{EvidenceMap, PropertyMap};
use crate::model::entity::{AssertionStamp, EntityId, EntityRef};
use crate::model::provenance::Provenance;
use crate::store::{PropertyStore, StoreResult};
use log::info;
use std::cmp::Ordering;

/// Result of one corroboration decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The new assertion is now the entity's active edge.
    Won,
    /// Another source's active edge was kept; the new edge is recorded inactive.
    Lost,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

/// Pure winner decision against the competing active edge, if any.
pub fn decide(competing: Option<&AssertionStamp>, provenance: &Provenance) -> Outcome {
    let Some(competing) = competing else {
        return Outcome::Won;
    };

    match provenance.retrieved_at().cmp(&competing.retrieved_at) {
        Ordering::Greater => Outcome::Won,
        Ordering::Less => Outcome::Lost,
        Ordering::Equal if provenance.trust_score() >= competing.trust_score => Outcome::Won,
        Ordering::Equal => Outcome::Lost,
    }
}

/// Applies one source's assertion about `entity` to the store.
///
/// Returns the outcome together with the entity id so callers can attach
/// links without a second lookup.
///
/// # Errors
/// - `StoreError::InvariantViolation` when more than one other source holds
///   an active edge for the entity.
/// - Any store error; the caller's transaction must then be rolled back.
pub fn corroborate(
    store: &impl PropertyStore,
    entity: &EntityRef,
    node_properties: &PropertyMap,
    evidence: &EvidenceMap,
    provenance: &Provenance,
) -> StoreResult<(Outcome, EntityId)> {
    let competing = store.find_competing_active(entity, provenance.source_id())?;
    let outcome = decide(competing.as_ref(), provenance);

    store.upsert_source(provenance.source_id())?;
    let entity_id = store.upsert_entity(entity)?;

    match outcome {
        Outcome::Won => {
            store.replace_entity_properties(entity_id, node_properties)?;
            store.deactivate_entity_assertions(entity_id)?;
            store.upsert_assertion(entity_id, provenance, evidence, true)?;
        }
        Outcome::Lost => {
            store.upsert_assertion(entity_id, provenance, evidence, false)?;
        }
    }

    info!(
        "event=corroborate module=corroboration status=ok outcome={} entity={} source={} competitor={}",
        outcome.as_str(),
        entity,
        provenance.source_id(),
        competing
            .as_ref()
            .map_or("none", |stamp| stamp.source_id.as_str())
    );
    Ok((outcome, entity_id))
}

#[cfg(test)]
mod tests {
    use super::{decide, Outcome};
    use crate::model::entity::AssertionStamp;
    use crate::model::provenance::Provenance;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn stamp(retrieved_at: DateTime<Utc>, trust_score: f64) -> AssertionStamp {
        AssertionStamp {
            source_id: "https://a.example/".to_string(),
            retrieved_at,
            trust_score,
        }
    }

    #[test]
    fn wins_without_competitor() {
        let provenance = Provenance::at("https://b.example/", at(2024, 1, 1), 0.1).unwrap();
        assert_eq!(decide(None, &provenance), Outcome::Won);
    }

    #[test]
    fn newer_timestamp_wins_regardless_of_trust() {
        let competitor = stamp(at(2024, 1, 1), 0.9);
        let provenance = Provenance::at("https://b.example/", at(2024, 2, 1), 0.1).unwrap();
        assert_eq!(decide(Some(&competitor), &provenance), Outcome::Won);
    }

    #[test]
    fn older_timestamp_loses_regardless_of_trust() {
        let competitor = stamp(at(2024, 2, 1), 0.1);
        let provenance = Provenance::at("https://b.example/", at(2024, 1, 1), 1.0).unwrap();
        assert_eq!(decide(Some(&competitor), &provenance), Outcome::Lost);
    }

    #[test]
    fn equal_timestamp_is_broken_by_trust() {
        let competitor = stamp(at(2024, 1, 1), 0.9);
        let higher = Provenance::at("https://b.example/", at(2024, 1, 1), 0.95).unwrap();
        let lower = Provenance::at("https://b.example/", at(2024, 1, 1), 0.5).unwrap();
        let equal = Provenance::at("https://b.example/", at(2024, 1, 1), 0.9).unwrap();

        assert_eq!(decide(Some(&competitor), &higher), Outcome::Won);
        assert_eq!(decide(Some(&competitor), &lower), Outcome::Lost);
        assert_eq!(decide(Some(&competitor), &equal), Outcome::Won);
    }
}
