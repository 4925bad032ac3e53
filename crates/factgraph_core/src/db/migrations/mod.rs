//! Entity store schema registry.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - The stored version is read and advanced under a `BEGIN IMMEDIATE`
//!   lock, so two processes opening a fresh file never both create tables.
//! - Existing rows are never rewritten; steps only add schema objects.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::cmp::Ordering;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "entity_store",
    sql: include_str!("0001_entity_store.sql"),
}];

/// Schema version written by this binary.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

/// Brings the store up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer binary.
pub fn bootstrap_schema(conn: &mut Connection) -> DbResult<()> {
    if pending_steps(stored_version(conn)?)?.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let stored = stored_version(&tx)?;
    for step in pending_steps(stored)? {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=schema_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    Ok(())
}

fn pending_steps(stored: u32) -> DbResult<&'static [SchemaStep]> {
    let latest = latest_version();
    match stored.cmp(&latest) {
        Ordering::Greater => Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        }),
        Ordering::Equal => Ok(&[]),
        Ordering::Less => Ok(&SCHEMA_STEPS[stored as usize..]),
    }
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
