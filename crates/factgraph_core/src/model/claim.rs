//! Atomic claims and the visitor contract over fact trees.
//!
//! # Responsibility
//! - Pair an extracted value with the evidence snippet that supports it.
//! - Expose each schema object's fields as statically tagged `Field`s.
//! - Let grounding reach every claim slot without reflection.
//!
//! # Invariants
//! - A claim with an absent or empty half is unusable and never persisted.
//! - `FactObject::accept` visits every claim slot of the subtree exactly once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One extracted fact plus the text snippet claimed to prove it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicClaim {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

impl AtomicClaim {
    pub fn new(value: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            evidence: Some(evidence.into()),
        }
    }

    /// Returns `(value, evidence)` when both halves are present and non-empty.
    pub fn usable_parts(&self) -> Option<(&str, &str)> {
        let value = self.value.as_deref().filter(|text| !text.is_empty())?;
        let evidence = self.evidence.as_deref().filter(|text| !text.is_empty())?;
        Some((value, evidence))
    }
}

/// Scalar stored in an entity property snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Integer(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Field name -> winning value, as persisted on an entity.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// `<field>_evidence` -> evidence snippet, as persisted on an assertion edge.
pub type EvidenceMap = BTreeMap<String, String>;

/// Compile-time tag for one flat field of a schema object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<'a> {
    /// Evidence-backed field; `None` once grounding removed it.
    Claim(Option<&'a AtomicClaim>),
    /// Plain scalar or enum tag that carries no evidence.
    Plain(Option<PropertyValue>),
}

/// Receives every claim slot during a tree walk.
pub trait ClaimVisitor {
    fn visit_claim(&mut self, field: &'static str, slot: &mut Option<AtomicClaim>);
}

/// Schema object that can be projected and walked.
pub trait FactObject {
    /// Flat fields of this object only; nested objects are not included.
    fn fields(&self) -> Vec<(&'static str, Field<'_>)>;

    /// Visits the claim slots of this object and of all nested objects.
    fn accept(&mut self, visitor: &mut dyn ClaimVisitor);
}

/// Walks every element of an ordered list of sub-objects.
pub fn accept_all<T: FactObject>(items: &mut [T], visitor: &mut dyn ClaimVisitor) {
    for item in items {
        item.accept(visitor);
    }
}

/// Returns the claim value when the slot still holds a usable value half.
pub fn claim_value(slot: &Option<AtomicClaim>) -> Option<&str> {
    slot.as_ref()
        .and_then(|claim| claim.value.as_deref())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{claim_value, AtomicClaim, PropertyValue};

    #[test]
    fn claim_with_empty_evidence_is_unusable() {
        let claim = AtomicClaim::new("2.5%", "");
        assert_eq!(claim.usable_parts(), None);
    }

    #[test]
    fn claim_with_missing_value_is_unusable() {
        let claim = AtomicClaim {
            value: None,
            evidence: Some("rate is 2.5%".to_string()),
        };
        assert_eq!(claim.usable_parts(), None);
        assert_eq!(claim_value(&Some(claim)), None);
    }

    #[test]
    fn property_value_deserializes_untagged() {
        let text: PropertyValue = serde_json::from_str("\"Advisor\"").unwrap();
        let number: PropertyValue = serde_json::from_str("5000").unwrap();
        assert_eq!(text, PropertyValue::Text("Advisor".to_string()));
        assert_eq!(number, PropertyValue::Integer(5000));
    }
}
