//! SQLite-backed property store.
//!
//! # Responsibility
//! - Implement `PropertyStore` over a borrowed connection or transaction.
//! - Encode snapshots and evidence as JSON columns.
//!
//! # Invariants
//! - Timestamps are stored as epoch microseconds.
//! - The partial unique index `ux_assertions_one_active` rejects a second
//!   active edge, so winners must deactivate before activating.

use super::{ActiveEdgeViolation, PropertyStore, StoreError, StoreResult};
use crate::inference::InferenceRule;
use crate::model::claim::{EvidenceMap, PropertyMap};
use crate::model::entity::{
    parse_entity_label, AssertionEdge, AssertionStamp, DerivedRelationship, EntityId,
    EntityLabel, EntityRecord, EntityRef, Relation,
};
use crate::model::provenance::Provenance;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

const ENTITY_SELECT_SQL: &str = "SELECT
    e.id,
    e.label,
    e.natural_key,
    e.properties_json
FROM entities e";

/// Property store over a migrated SQLite connection.
///
/// Pass a `rusqlite::Transaction` (it derefs to `Connection`) to make every
/// call part of one atomic unit.
pub struct SqlitePropertyStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PropertyStore for SqlitePropertyStore<'_> {
    fn upsert_source(&self, source_id: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sources (source_id) VALUES (?1);",
            [source_id],
        )?;
        Ok(())
    }

    fn upsert_entity(&self, entity: &EntityRef) -> StoreResult<EntityId> {
        self.conn.execute(
            "INSERT INTO entities (label, natural_key)
             VALUES (?1, ?2)
             ON CONFLICT (label, natural_key) DO NOTHING;",
            params![entity.label.as_str(), entity.natural_key.as_str()],
        )?;
        let entity_id = self.conn.query_row(
            "SELECT id FROM entities WHERE label = ?1 AND natural_key = ?2;",
            params![entity.label.as_str(), entity.natural_key.as_str()],
            |row| row.get(0),
        )?;
        Ok(entity_id)
    }

    fn find_competing_active(
        &self,
        entity: &EntityRef,
        source_id: &str,
    ) -> StoreResult<Option<AssertionStamp>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.source_id, a.retrieved_at_us, a.trust_score
             FROM assertions a
             INNER JOIN entities e ON e.id = a.entity_id
             WHERE e.label = ?1
               AND e.natural_key = ?2
               AND a.is_active = 1
               AND a.source_id <> ?3;",
        )?;
        let mut rows = stmt.query(params![
            entity.label.as_str(),
            entity.natural_key.as_str(),
            source_id
        ])?;

        let mut stamps = Vec::new();
        while let Some(row) = rows.next()? {
            stamps.push(AssertionStamp {
                source_id: row.get(0)?,
                retrieved_at: micros_to_datetime(row.get(1)?)?,
                trust_score: row.get(2)?,
            });
        }

        if stamps.len() > 1 {
            return Err(StoreError::InvariantViolation {
                entity: entity.clone(),
                active_edges: stamps.len(),
            });
        }
        Ok(stamps.pop())
    }

    fn replace_entity_properties(
        &self,
        entity_id: EntityId,
        properties: &PropertyMap,
    ) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE entities SET properties_json = ?2 WHERE id = ?1;",
            params![entity_id, to_json(properties)?],
        )?;
        if changed == 0 {
            return Err(StoreError::InvalidData(format!(
                "entity id {entity_id} does not exist"
            )));
        }
        Ok(())
    }

    fn deactivate_entity_assertions(&self, entity_id: EntityId) -> StoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE assertions SET is_active = 0 WHERE entity_id = ?1 AND is_active = 1;",
            [entity_id],
        )?;
        Ok(changed)
    }

    fn upsert_assertion(
        &self,
        entity_id: EntityId,
        provenance: &Provenance,
        evidence: &EvidenceMap,
        active: bool,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO assertions (
                entity_id,
                source_id,
                is_active,
                retrieved_at_us,
                trust_score,
                evidence_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (entity_id, source_id) DO UPDATE SET
                is_active = excluded.is_active,
                retrieved_at_us = excluded.retrieved_at_us,
                trust_score = excluded.trust_score,
                evidence_json = excluded.evidence_json;",
            params![
                entity_id,
                provenance.source_id(),
                bool_to_int(active),
                provenance.retrieved_at().timestamp_micros(),
                provenance.trust_score(),
                to_json(evidence)?,
            ],
        )?;
        Ok(())
    }

    fn deactivate_source_assertions(
        &self,
        source_id: &str,
        labels: &[EntityLabel],
    ) -> StoreResult<usize> {
        if labels.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; labels.len()].join(", ");
        let sql = format!(
            "UPDATE assertions
             SET is_active = 0
             WHERE source_id = ?
               AND is_active = 1
               AND entity_id IN (
                   SELECT id FROM entities WHERE label IN ({placeholders})
               );"
        );
        let mut bind_values = vec![Value::Text(source_id.to_string())];
        bind_values.extend(
            labels
                .iter()
                .map(|label| Value::Text(label.as_str().to_string())),
        );

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }

    fn merge_link(&self, from: EntityId, relation: Relation, to: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO links (from_entity, relation, to_entity) VALUES (?1, ?2, ?3);",
            params![from, relation.as_str(), to],
        )?;
        Ok(())
    }

    fn replace_link(&self, from: EntityId, relation: Relation, to: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM links WHERE from_entity = ?1 AND relation = ?2 AND to_entity <> ?3;",
            params![from, relation.as_str(), to],
        )?;
        self.merge_link(from, relation, to)
    }

    fn clear_links(&self, from: EntityId, relation: Relation) -> StoreResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM links WHERE from_entity = ?1 AND relation = ?2;",
            params![from, relation.as_str()],
        )?;
        Ok(removed)
    }

    fn delete_derived(&self, kind: &str) -> StoreResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM derived_links WHERE kind = ?1;", [kind])?;
        Ok(deleted)
    }

    fn materialize_derived(&self, rule: &InferenceRule) -> StoreResult<usize> {
        let created = self.conn.execute(
            "INSERT OR IGNORE INTO derived_links (kind, from_entity, to_entity)
             SELECT ?1, src.id, dst.id
             FROM entities src
             INNER JOIN links src_link
                ON src_link.from_entity = src.id AND src_link.relation = ?3
             INNER JOIN entities src_class
                ON src_class.id = src_link.to_entity
               AND src_class.label = ?4
               AND src_class.natural_key = ?5
             INNER JOIN entities dst ON dst.label = ?6
             INNER JOIN links dst_link
                ON dst_link.from_entity = dst.id AND dst_link.relation = ?7
             INNER JOIN entities dst_class
                ON dst_class.id = dst_link.to_entity
               AND dst_class.label = ?8
               AND dst_class.natural_key = ?9
             WHERE src.label = ?2
               AND EXISTS (
                   SELECT 1 FROM assertions a WHERE a.entity_id = src.id AND a.is_active = 1
               )
               AND EXISTS (
                   SELECT 1 FROM assertions a WHERE a.entity_id = dst.id AND a.is_active = 1
               );",
            params![
                rule.kind,
                rule.from.label.as_str(),
                rule.from.relation.as_str(),
                rule.from.class.label.as_str(),
                rule.from.class.natural_key.as_str(),
                rule.to.label.as_str(),
                rule.to.relation.as_str(),
                rule.to.class.label.as_str(),
                rule.to.class.natural_key.as_str(),
            ],
        )?;
        Ok(created)
    }

    fn get_entity(&self, entity: &EntityRef) -> StoreResult<Option<EntityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTITY_SELECT_SQL} WHERE e.label = ?1 AND e.natural_key = ?2;"
        ))?;
        let mut rows = stmt.query(params![entity.label.as_str(), entity.natural_key.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn list_assertions(&self, entity: &EntityRef) -> StoreResult<Vec<AssertionEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                a.entity_id,
                a.source_id,
                a.is_active,
                a.retrieved_at_us,
                a.trust_score,
                a.evidence_json
             FROM assertions a
             INNER JOIN entities e ON e.id = a.entity_id
             WHERE e.label = ?1 AND e.natural_key = ?2
             ORDER BY a.retrieved_at_us ASC, a.source_id ASC;",
        )?;
        let mut rows = stmt.query(params![entity.label.as_str(), entity.natural_key.as_str()])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_assertion_row(row)?);
        }
        Ok(edges)
    }

    fn list_active_entities(&self, label: EntityLabel) -> StoreResult<Vec<EntityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTITY_SELECT_SQL}
             WHERE e.label = ?1
               AND EXISTS (
                   SELECT 1 FROM assertions a WHERE a.entity_id = e.id AND a.is_active = 1
               )
             ORDER BY e.natural_key ASC;"
        ))?;
        let mut rows = stmt.query([label.as_str()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_entity_row(row)?);
        }
        Ok(records)
    }

    fn list_link_targets(
        &self,
        from: &EntityRef,
        relation: Relation,
    ) -> StoreResult<Vec<EntityRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT dst.label, dst.natural_key
             FROM links l
             INNER JOIN entities src ON src.id = l.from_entity
             INNER JOIN entities dst ON dst.id = l.to_entity
             WHERE src.label = ?1 AND src.natural_key = ?2 AND l.relation = ?3
             ORDER BY dst.label ASC, dst.natural_key ASC;",
        )?;
        let mut rows = stmt.query(params![
            from.label.as_str(),
            from.natural_key.as_str(),
            relation.as_str()
        ])?;
        let mut targets = Vec::new();
        while let Some(row) = rows.next()? {
            targets.push(parse_entity_ref(row, 0, 1)?);
        }
        Ok(targets)
    }

    fn list_derived(&self, kind: &str) -> StoreResult<Vec<DerivedRelationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT src.label, src.natural_key, dst.label, dst.natural_key
             FROM derived_links d
             INNER JOIN entities src ON src.id = d.from_entity
             INNER JOIN entities dst ON dst.id = d.to_entity
             WHERE d.kind = ?1
             ORDER BY src.natural_key ASC, dst.natural_key ASC;",
        )?;
        let mut rows = stmt.query([kind])?;
        let mut derived = Vec::new();
        while let Some(row) = rows.next()? {
            derived.push(DerivedRelationship {
                kind: kind.to_string(),
                from: parse_entity_ref(row, 0, 1)?,
                to: parse_entity_ref(row, 2, 3)?,
            });
        }
        Ok(derived)
    }

    fn find_active_edge_violations(&self) -> StoreResult<Vec<ActiveEdgeViolation>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.label, e.natural_key, COUNT(*) AS active_edges
             FROM assertions a
             INNER JOIN entities e ON e.id = a.entity_id
             WHERE a.is_active = 1
             GROUP BY a.entity_id
             HAVING COUNT(*) > 1
             ORDER BY e.label ASC, e.natural_key ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut violations = Vec::new();
        while let Some(row) = rows.next()? {
            let active_edges: i64 = row.get(2)?;
            violations.push(ActiveEdgeViolation {
                entity: parse_entity_ref(row, 0, 1)?,
                active_edges: usize::try_from(active_edges).map_err(|_| {
                    StoreError::InvalidData(format!("invalid active edge count {active_edges}"))
                })?,
            });
        }
        Ok(violations)
    }
}

fn parse_entity_row(row: &Row<'_>) -> StoreResult<EntityRecord> {
    let properties_text: String = row.get("properties_json")?;
    Ok(EntityRecord {
        entity_id: row.get("id")?,
        entity: parse_entity_ref(row, 1, 2)?,
        properties: from_json::<PropertyMap>(&properties_text, "entities.properties_json")?,
    })
}

fn parse_assertion_row(row: &Row<'_>) -> StoreResult<AssertionEdge> {
    let active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_active value `{other}` in assertions.is_active"
            )));
        }
    };
    let evidence_text: String = row.get("evidence_json")?;

    Ok(AssertionEdge {
        entity_id: row.get("entity_id")?,
        source_id: row.get("source_id")?,
        active,
        retrieved_at: micros_to_datetime(row.get("retrieved_at_us")?)?,
        trust_score: row.get("trust_score")?,
        evidence: from_json::<EvidenceMap>(&evidence_text, "assertions.evidence_json")?,
    })
}

fn parse_entity_ref(row: &Row<'_>, label_idx: usize, key_idx: usize) -> StoreResult<EntityRef> {
    let label_text: String = row.get(label_idx)?;
    let label = parse_entity_label(&label_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid entity label `{label_text}`"))
    })?;
    Ok(EntityRef::new(label, row.get::<_, String>(key_idx)?))
}

fn micros_to_datetime(micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid retrieved_at_us value `{micros}`"))
    })
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::InvalidData(format!("failed to encode JSON column: {err}")))
}

fn from_json<T: DeserializeOwned>(text: &str, column: &str) -> StoreResult<T> {
    serde_json::from_str(text)
        .map_err(|err| StoreError::InvalidData(format!("invalid JSON in {column}: {err}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
