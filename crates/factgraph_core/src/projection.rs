//! Flat property views over (possibly grounded) schema objects.
//!
//! Both projections are pure: they read only the object's own flat fields,
//! never nested sub-objects, and skip claims that grounding removed.

use crate::model::claim::{EvidenceMap, FactObject, Field, PropertyMap};

/// Field name -> claim value, plus plain scalars and enum tags.
pub fn node_properties(object: &dyn FactObject) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for (name, field) in object.fields() {
        match field {
            Field::Claim(Some(claim)) => {
                if let Some(value) = claim.value.as_ref() {
                    properties.insert(name.to_string(), value.clone().into());
                }
            }
            Field::Plain(Some(value)) => {
                properties.insert(name.to_string(), value);
            }
            Field::Claim(None) | Field::Plain(None) => {}
        }
    }
    properties
}

/// `<field>_evidence` -> evidence snippet of each surviving claim.
///
/// Provenance (`retrieved_at`, `trust_score`) is attached by the store when
/// the assertion edge is written.
pub fn assertion_properties(object: &dyn FactObject) -> EvidenceMap {
    let mut evidence = EvidenceMap::new();
    for (name, field) in object.fields() {
        if let Field::Claim(Some(claim)) = field {
            if let Some(snippet) = claim.evidence.as_ref() {
                evidence.insert(format!("{name}_evidence"), snippet.clone());
            }
        }
    }
    evidence
}
