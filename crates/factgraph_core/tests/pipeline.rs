use factgraph_core::db::open_db_in_memory;
use factgraph_core::{
    BranchData, DocumentSource, EntityLabel, EntityRef, EvidenceContainsOracle, ExtractionFailure,
    Extractor, Pipeline, PipelineError, ProductData, PropertyStore, RetrievalError, SkipReason,
    SqlitePropertyStore, TrustPolicy, TrustRule, ADVISES_ON,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::marker::PhantomData;

const PRODUCT_URL: &str = "https://www.bank.example/sparbrief";
const BRANCH_URL: &str = "https://www.bank.example/filiale-hermannsburg";
const OFFLINE_URL: &str = "https://offline.example/";
const GARBLED_URL: &str = "https://www.bank.example/garbled";

/// Serves fixed page texts; unknown urls fail to fetch.
struct FixedPages(HashMap<&'static str, String>);

impl DocumentSource for FixedPages {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        self.0.get(url).cloned().ok_or_else(|| RetrievalError {
            message: format!("no route to {url}"),
        })
    }
}

/// Treats the page text as the extracted tree in JSON form.
struct JsonExtractor<T>(PhantomData<T>);

impl<T> JsonExtractor<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: DeserializeOwned> Extractor<T> for JsonExtractor<T> {
    fn extract(&self, text: &str) -> Result<T, ExtractionFailure> {
        serde_json::from_str(text).map_err(|err| ExtractionFailure {
            message: err.to_string(),
        })
    }
}

fn product_page(name_evidence: &str) -> String {
    json!({
        "product": {
            "name": {"value": "Sparbrief", "evidence": name_evidence}
        },
        "product_type": {"name": "InterestProduct"},
        "faqs": [
            {
                "question": {"value": "Ist der Zins fest?", "evidence": "Ist der Zins fest? Ja."},
                "answer": {"value": "Ja", "evidence": "Ist der Zins fest? Ja."}
            }
        ]
    })
    .to_string()
}

fn branch_page() -> String {
    json!({
        "branch": {
            "name": {"value": "Hermannsburg", "evidence": "Filiale Hermannsburg"},
            "employees": [
                {
                    "name": {"value": "Anna Berg", "evidence": "Beratung: Anna Berg"},
                    "role_type": "Advisor"
                }
            ]
        }
    })
    .to_string()
}

fn pages(product_evidence: &str) -> FixedPages {
    let mut pages = HashMap::new();
    pages.insert(PRODUCT_URL, product_page(product_evidence));
    pages.insert(BRANCH_URL, branch_page());
    pages.insert(GARBLED_URL, "<html>not json</html>".to_string());
    FixedPages(pages)
}

fn trust() -> TrustPolicy {
    TrustPolicy::new(vec![TrustRule {
        prefix: "https://www.bank.example/".to_string(),
        score: 0.9,
    }])
}

fn urls(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn run_ingests_sources_and_derives_relationships() {
    let mut conn = open_db_in_memory().unwrap();
    let documents = pages("Der Sparbrief");
    let products = JsonExtractor::<ProductData>::new();
    let branches = JsonExtractor::<BranchData>::new();
    let trust = trust();
    let pipeline = Pipeline {
        documents: &documents,
        products: &products,
        branches: &branches,
        oracle: &EvidenceContainsOracle,
        trust: &trust,
    };

    let summary = pipeline
        .run(&mut conn, &urls(&[PRODUCT_URL]), &urls(&[BRANCH_URL]))
        .unwrap();

    assert_eq!(summary.ingested.len(), 2);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.derived.created, 1);

    let store = SqlitePropertyStore::new(&conn);
    let edges = store
        .list_assertions(&EntityRef::new(EntityLabel::Product, "Sparbrief"))
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source_id, PRODUCT_URL);
    assert_eq!(edges[0].trust_score, 0.9);
    assert_eq!(store.list_derived(ADVISES_ON).unwrap().len(), 1);
}

#[test]
fn failing_sources_are_skipped_without_stopping_the_run() {
    let mut conn = open_db_in_memory().unwrap();
    let documents = pages("Der Sparbrief");
    let products = JsonExtractor::<ProductData>::new();
    let branches = JsonExtractor::<BranchData>::new();
    let trust = trust();
    let pipeline = Pipeline {
        documents: &documents,
        products: &products,
        branches: &branches,
        oracle: &EvidenceContainsOracle,
        trust: &trust,
    };

    let summary = pipeline
        .run(
            &mut conn,
            &urls(&[OFFLINE_URL, GARBLED_URL, PRODUCT_URL]),
            &urls(&[BRANCH_URL]),
        )
        .unwrap();

    assert_eq!(summary.ingested.len(), 2);
    assert_eq!(summary.skipped.len(), 2);
    assert_eq!(summary.skipped[0].url, OFFLINE_URL);
    assert!(matches!(summary.skipped[0].reason, SkipReason::Retrieval(_)));
    assert_eq!(summary.skipped[1].url, GARBLED_URL);
    assert!(matches!(summary.skipped[1].reason, SkipReason::Extraction(_)));
}

#[test]
fn ungrounded_product_name_skips_the_package() {
    let mut conn = open_db_in_memory().unwrap();
    let documents = pages("Ein Festgeldkonto");
    let products = JsonExtractor::<ProductData>::new();
    let branches = JsonExtractor::<BranchData>::new();
    let trust = trust();
    let pipeline = Pipeline {
        documents: &documents,
        products: &products,
        branches: &branches,
        oracle: &EvidenceContainsOracle,
        trust: &trust,
    };

    let summary = pipeline.run(&mut conn, &urls(&[PRODUCT_URL]), &[]).unwrap();

    assert!(summary.ingested.is_empty());
    assert_eq!(
        summary.skipped[0].reason,
        SkipReason::MissingIdentity(EntityLabel::Product)
    );
    let store = SqlitePropertyStore::new(&conn);
    assert!(store.list_active_entities(EntityLabel::Product).unwrap().is_empty());
    assert!(store.list_active_entities(EntityLabel::Faq).unwrap().is_empty());
}

#[test]
fn store_failure_aborts_run_and_rolls_back_package() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_faq BEFORE INSERT ON entities
         WHEN NEW.label = 'FAQ'
         BEGIN SELECT RAISE(ABORT, 'faq storage unavailable'); END;",
    )
    .unwrap();
    let documents = pages("Der Sparbrief");
    let products = JsonExtractor::<ProductData>::new();
    let branches = JsonExtractor::<BranchData>::new();
    let trust = trust();
    let pipeline = Pipeline {
        documents: &documents,
        products: &products,
        branches: &branches,
        oracle: &EvidenceContainsOracle,
        trust: &trust,
    };

    let err = pipeline
        .run(&mut conn, &urls(&[PRODUCT_URL]), &urls(&[BRANCH_URL]))
        .unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)));
    let store = SqlitePropertyStore::new(&conn);
    assert_eq!(
        store
            .get_entity(&EntityRef::new(EntityLabel::Product, "Sparbrief"))
            .unwrap(),
        None
    );
    assert!(store.list_active_entities(EntityLabel::Branch).unwrap().is_empty());
}
