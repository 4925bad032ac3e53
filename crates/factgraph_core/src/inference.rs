//! Derived relationship recomputation.
//!
//! # Responsibility
//! - Declare inference rules as data over classification links.
//! - Rebuild a rule's relationships from active state in one transaction.
//!
//! # Invariants
//! - A rerun deletes every relationship of the rule's kind before recomputing.
//! - Only entities holding an active assertion edge take part.
//! - Repeated runs over unchanged state yield the same set, never duplicates.

use crate::model::entity::{EntityLabel, EntityRef, Relation};
use crate::model::schema::{ProductType, RoleType};
use crate::store::{PropertyStore, SqlitePropertyStore, StoreResult};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

/// Kind string of the advisor eligibility relationship.
pub const ADVISES_ON: &str = "ADVISES_ON";

/// Structural predicate one endpoint of a derived relationship must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPredicate {
    pub label: EntityLabel,
    /// Classification link the endpoint must hold...
    pub relation: Relation,
    /// ...pointing at this classification entity.
    pub class: EntityRef,
}

/// Joins every active `from` entity with every active `to` entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRule {
    pub kind: &'static str,
    pub from: EndpointPredicate,
    pub to: EndpointPredicate,
}

impl InferenceRule {
    /// Active advisors may advise on every active interest product.
    pub fn advises_on() -> Self {
        Self {
            kind: ADVISES_ON,
            from: EndpointPredicate {
                label: EntityLabel::Employee,
                relation: Relation::HasRoleType,
                class: EntityRef::new(EntityLabel::RoleType, RoleType::Advisor.as_str()),
            },
            to: EndpointPredicate {
                label: EntityLabel::Product,
                relation: Relation::HasProductType,
                class: EntityRef::new(
                    EntityLabel::ProductType,
                    ProductType::InterestProduct.as_str(),
                ),
            },
        }
    }
}

/// Counts of one rederive run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RederiveReport {
    pub deleted: usize,
    pub created: usize,
}

/// Recomputes `rule` inside the caller's transaction.
pub fn rederive_in(store: &impl PropertyStore, rule: &InferenceRule) -> StoreResult<RederiveReport> {
    let deleted = store.delete_derived(rule.kind)?;
    let created = store.materialize_derived(rule)?;
    Ok(RederiveReport { deleted, created })
}

/// Recomputes `rule` in its own transaction.
///
/// # Side effects
/// - Emits `rederive` events with counts, duration and status.
pub fn rederive(conn: &mut Connection, rule: &InferenceRule) -> StoreResult<RederiveReport> {
    let started_at = Instant::now();
    let result = rederive_committed(conn, rule);

    match &result {
        Ok(report) => info!(
            "event=rederive module=inference status=ok kind={} deleted={} created={} duration_ms={}",
            rule.kind,
            report.deleted,
            report.created,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=rederive module=inference status=error kind={} duration_ms={} error={err}",
            rule.kind,
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn rederive_committed(conn: &mut Connection, rule: &InferenceRule) -> StoreResult<RederiveReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let report = rederive_in(&SqlitePropertyStore::new(&tx), rule)?;
    tx.commit()?;
    Ok(report)
}
