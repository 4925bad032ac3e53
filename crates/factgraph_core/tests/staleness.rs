use chrono::{TimeZone, Utc};
use factgraph_core::db::open_db_in_memory;
use factgraph_core::{
    mark_stale, AtomicClaim, BranchData, BranchModel, EmployeeModel, EntityLabel, EntityRef,
    ExtractionPackage, IngestService, PropertyStore, Provenance, RoleType, SqlitePropertyStore,
};
use rusqlite::Connection;

const SOURCE_A: &str = "https://www.bank.example/filiale-hermannsburg";
const SOURCE_C: &str = "https://www.bank.example/filiale-soltau";

fn claim(value: &str) -> Option<AtomicClaim> {
    Some(AtomicClaim::new(value, format!("Ansprechpartner: {value}")))
}

fn employee(name: &str) -> EmployeeModel {
    EmployeeModel {
        name: claim(name),
        email: None,
        phone: None,
        role_type: RoleType::Advisor,
    }
}

fn branch_package(source: &str, day: u32, branch: &str, employees: &[&str]) -> ExtractionPackage<BranchData> {
    let at = Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap();
    let data = BranchData {
        branch: BranchModel {
            name: claim(branch),
            address: None,
            employees: employees.iter().map(|name| employee(name)).collect(),
        },
    };
    ExtractionPackage::new(Provenance::at(source, at, 0.9).unwrap(), data)
}

fn active_employees(conn: &Connection) -> Vec<String> {
    SqlitePropertyStore::new(conn)
        .list_active_entities(EntityLabel::Employee)
        .unwrap()
        .into_iter()
        .map(|record| record.entity.natural_key)
        .collect()
}

fn edge_active(conn: &Connection, name: &str, source: &str) -> Option<bool> {
    SqlitePropertyStore::new(conn)
        .list_assertions(&EntityRef::new(EntityLabel::Employee, name))
        .unwrap()
        .into_iter()
        .find(|edge| edge.source_id == source)
        .map(|edge| edge.active)
}

#[test]
fn entity_missing_from_new_batch_loses_its_active_edge() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);
    service
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Anna Berg", "Jonas Kranz"]))
        .unwrap();
    let report = service
        .ingest(&branch_package(SOURCE_A, 2, "Hermannsburg", &["Anna Berg"]))
        .unwrap();

    assert_eq!(report.swept, 3);
    assert_eq!(edge_active(&conn, "Anna Berg", SOURCE_A), Some(true));
    assert_eq!(edge_active(&conn, "Jonas Kranz", SOURCE_A), Some(false));
    assert_eq!(active_employees(&conn), vec!["Anna Berg".to_string()]);
}

#[test]
fn stale_entity_keeps_its_node_and_snapshot() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);
    service
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Anna Berg", "Jonas Kranz"]))
        .unwrap();
    service
        .ingest(&branch_package(SOURCE_A, 2, "Hermannsburg", &["Anna Berg"]))
        .unwrap();

    let record = SqlitePropertyStore::new(&conn)
        .get_entity(&EntityRef::new(EntityLabel::Employee, "Jonas Kranz"))
        .unwrap()
        .unwrap();
    assert_eq!(
        record.properties.get("name").and_then(|value| value.as_text()),
        Some("Jonas Kranz")
    );
}

#[test]
fn sweep_leaves_other_sources_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);
    service
        .ingest(&branch_package(SOURCE_C, 1, "Soltau", &["Lea Otte"]))
        .unwrap();
    service
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Anna Berg"]))
        .unwrap();
    service
        .ingest(&branch_package(SOURCE_A, 2, "Hermannsburg", &[]))
        .unwrap();

    assert_eq!(edge_active(&conn, "Lea Otte", SOURCE_C), Some(true));
    assert_eq!(edge_active(&conn, "Anna Berg", SOURCE_A), Some(false));
    assert_eq!(active_employees(&conn), vec!["Lea Otte".to_string()]);
}

#[test]
fn reconfirmed_entity_becomes_active_again() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = IngestService::new(&mut conn);
    service
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Jonas Kranz"]))
        .unwrap();
    service
        .ingest(&branch_package(SOURCE_A, 2, "Hermannsburg", &[]))
        .unwrap();
    service
        .ingest(&branch_package(SOURCE_A, 3, "Hermannsburg", &["Jonas Kranz"]))
        .unwrap();

    assert_eq!(edge_active(&conn, "Jonas Kranz", SOURCE_A), Some(true));
}

#[test]
fn sweep_only_touches_requested_labels() {
    let mut conn = open_db_in_memory().unwrap();
    IngestService::new(&mut conn)
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Anna Berg"]))
        .unwrap();

    let tx = conn.transaction().unwrap();
    let swept = mark_stale(&SqlitePropertyStore::new(&tx), SOURCE_A, &[EntityLabel::Employee])
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(swept, 1);
    let branches = SqlitePropertyStore::new(&conn)
        .list_active_entities(EntityLabel::Branch)
        .unwrap();
    assert_eq!(branches.len(), 1);
    assert!(active_employees(&conn).is_empty());
}

#[test]
fn sweep_with_no_labels_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();
    IngestService::new(&mut conn)
        .ingest(&branch_package(SOURCE_A, 1, "Hermannsburg", &["Anna Berg"]))
        .unwrap();

    let swept = mark_stale(&SqlitePropertyStore::new(&conn), SOURCE_A, &[]).unwrap();

    assert_eq!(swept, 0);
    assert_eq!(active_employees(&conn), vec!["Anna Berg".to_string()]);
}
