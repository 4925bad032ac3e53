//! Store-facing entity, assertion and relationship records.
//!
//! # Responsibility
//! - Name entity kinds and relationship kinds with stable storage strings.
//! - Define the read models returned by the property store.
//!
//! # Invariants
//! - Exactly one entity exists per `(label, natural_key)`.
//! - At most one assertion edge exists per `(entity, source)`.
//! - At most one assertion edge per entity is active at a quiescent point.

use crate::model::claim::{EvidenceMap, PropertyMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Row id of an entity inside the store.
pub type EntityId = i64;

/// Entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Product,
    Condition,
    #[serde(rename = "FAQ")]
    Faq,
    Branch,
    Employee,
    ProductType,
    RiskClass,
    RoleType,
}

impl EntityLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::Condition => "Condition",
            Self::Faq => "FAQ",
            Self::Branch => "Branch",
            Self::Employee => "Employee",
            Self::ProductType => "ProductType",
            Self::RiskClass => "RiskClass",
            Self::RoleType => "RoleType",
        }
    }
}

impl Display for EntityLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one label from its storage string.
pub fn parse_entity_label(value: &str) -> Option<EntityLabel> {
    match value {
        "Product" => Some(EntityLabel::Product),
        "Condition" => Some(EntityLabel::Condition),
        "FAQ" => Some(EntityLabel::Faq),
        "Branch" => Some(EntityLabel::Branch),
        "Employee" => Some(EntityLabel::Employee),
        "ProductType" => Some(EntityLabel::ProductType),
        "RiskClass" => Some(EntityLabel::RiskClass),
        "RoleType" => Some(EntityLabel::RoleType),
        _ => None,
    }
}

/// Asserted (non-derived) relationship kind between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    HasProductType,
    HasRiskClass,
    HasRoleType,
    HasCondition,
    HasFaq,
    WorksIn,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasProductType => "HAS_PRODUCT_TYPE",
            Self::HasRiskClass => "HAS_RISK_CLASS",
            Self::HasRoleType => "HAS_ROLE_TYPE",
            Self::HasCondition => "HAS_CONDITION",
            Self::HasFaq => "HAS_FAQ",
            Self::WorksIn => "WORKS_IN",
        }
    }

    /// Classification relations hold one target per entity and are replaced.
    pub fn is_classification(self) -> bool {
        matches!(
            self,
            Self::HasProductType | Self::HasRiskClass | Self::HasRoleType
        )
    }
}

/// `(label, natural_key)` identity of one entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub label: EntityLabel,
    pub natural_key: String,
}

impl EntityRef {
    pub fn new(label: EntityLabel, natural_key: impl Into<String>) -> Self {
        Self {
            label,
            natural_key: natural_key.into(),
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.label, self.natural_key)
    }
}

/// Entity with its current (last winning) property snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub entity: EntityRef,
    pub properties: PropertyMap,
}

/// One source's latest assertion about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionEdge {
    pub entity_id: EntityId,
    pub source_id: String,
    pub active: bool,
    pub retrieved_at: DateTime<Utc>,
    pub trust_score: f64,
    pub evidence: EvidenceMap,
}

/// Version stamp of an active edge that competes with a new assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionStamp {
    pub source_id: String,
    pub retrieved_at: DateTime<Utc>,
    pub trust_score: f64,
}

/// Relationship computed from active state, never asserted directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DerivedRelationship {
    pub kind: String,
    pub from: EntityRef,
    pub to: EntityRef,
}
