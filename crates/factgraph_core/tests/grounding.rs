use factgraph_core::{
    ground, ground_package, AtomicClaim, BranchData, EvidenceContainsOracle, ExtractionPackage,
    OracleError, ProductData, Provenance, VerificationOracle,
};
use serde_json::json;
use std::cell::RefCell;

/// Confirms every claim except the listed values and records each call.
#[derive(Default)]
struct RecordingOracle {
    reject: Vec<&'static str>,
    fail: Vec<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl VerificationOracle for RecordingOracle {
    fn verify(&self, value: &str, _evidence: &str) -> Result<bool, OracleError> {
        self.calls.borrow_mut().push(value.to_string());
        if self.fail.contains(&value) {
            return Err(OracleError::new("model timeout"));
        }
        Ok(!self.reject.contains(&value))
    }
}

fn product_tree() -> ProductData {
    serde_json::from_value(json!({
        "product": {
            "name": {"value": "Sparbrief", "evidence": "Der Sparbrief bietet feste Zinsen"},
            "description": {"value": "feste Zinsen", "evidence": "Der Sparbrief bietet feste Zinsen"}
        },
        "product_type": {"name": "InterestProduct"},
        "conditions": [
            {
                "type": {"value": "Festzins", "evidence": "Festzins"},
                "min_amount": 5000,
                "term_years": 6,
                "interest_rate": {"value": "2.5%", "evidence": "Zinssatz 2.5%"}
            },
            {
                "min_amount": 50000,
                "interest_rate": {"value": "3.1%", "evidence": "Zinssatz 2.9%"}
            }
        ],
        "faqs": [
            {
                "question": {"value": "Ist der Zins fest?", "evidence": ""},
                "answer": {"value": "Ja", "evidence": "Ja, ueber die gesamte Laufzeit"}
            }
        ]
    }))
    .unwrap()
}

#[test]
fn every_usable_claim_is_verified_exactly_once() {
    let mut tree = product_tree();
    let oracle = RecordingOracle::default();

    let report = ground(&mut tree, &oracle);

    let mut calls = oracle.calls.into_inner();
    calls.sort();
    assert_eq!(
        calls,
        vec!["2.5%", "3.1%", "Festzins", "Ja", "Sparbrief", "feste Zinsen"]
    );
    assert_eq!(report.kept, 6);
    assert_eq!(report.removed_incomplete, 1);
}

#[test]
fn claim_with_empty_evidence_is_removed_without_oracle_call() {
    let mut tree = product_tree();
    let oracle = RecordingOracle::default();

    ground(&mut tree, &oracle);

    let faq = &tree.faqs.as_ref().unwrap()[0];
    assert!(faq.question.is_none());
    assert!(faq.answer.is_some());
    assert!(!oracle
        .calls
        .borrow()
        .iter()
        .any(|value| value == "Ist der Zins fest?"));
}

#[test]
fn rejected_claims_are_removed_and_the_rest_kept_unchanged() {
    let mut tree = product_tree();
    let oracle = RecordingOracle {
        reject: vec!["3.1%"],
        ..RecordingOracle::default()
    };

    let report = ground(&mut tree, &oracle);

    let conditions = tree.conditions.as_ref().unwrap();
    assert_eq!(conditions[1].interest_rate, None);
    assert_eq!(conditions[1].min_amount, Some(50000));
    assert_eq!(
        conditions[0].interest_rate,
        Some(AtomicClaim::new("2.5%", "Zinssatz 2.5%"))
    );
    assert_eq!(report.removed_unsupported, 1);
}

#[test]
fn oracle_error_counts_as_unsupported() {
    let mut tree = product_tree();
    let oracle = RecordingOracle {
        fail: vec!["feste Zinsen"],
        ..RecordingOracle::default()
    };

    let report = ground(&mut tree, &oracle);

    assert!(tree.product.description.is_none());
    assert!(tree.product.name.is_some());
    assert_eq!(report.removed_oracle_error, 1);
    assert_eq!(report.removed(), 2);
}

#[test]
fn non_claim_fields_survive_grounding() {
    let mut tree = product_tree();
    let reject_all = |_: &str, _: &str| -> Result<bool, OracleError> { Ok(false) };

    ground(&mut tree, &reject_all);

    assert!(tree.product_type.is_some());
    let conditions = tree.conditions.as_ref().unwrap();
    assert_eq!(conditions[0].min_amount, Some(5000));
    assert_eq!(conditions[0].term_years, Some(6));
    assert!(conditions.iter().all(|condition| condition.interest_rate.is_none()));
}

#[test]
fn literal_oracle_filters_branch_employees() {
    let data: BranchData = serde_json::from_value(json!({
        "branch": {
            "name": {"value": "Hermannsburg", "evidence": "Filiale Hermannsburg"},
            "employees": [
                {
                    "name": {"value": "Anna Berg", "evidence": "Ihre Beraterin: ANNA  BERG"},
                    "email": {"value": "anna.berg@bank.example", "evidence": "Tel. 05052 1234"},
                    "role_type": "Advisor"
                }
            ]
        }
    }))
    .unwrap();
    let provenance = Provenance::new("https://www.bank.example/filiale", 0.9).unwrap();

    let (package, report) =
        ground_package(ExtractionPackage::new(provenance, data), &EvidenceContainsOracle);

    let employee = &package.data.branch.employees[0];
    assert_eq!(employee.name, Some(AtomicClaim::new("Anna Berg", "Ihre Beraterin: ANNA  BERG")));
    assert!(employee.email.is_none());
    assert_eq!(report.kept, 2);
    assert_eq!(report.removed_unsupported, 1);
}
