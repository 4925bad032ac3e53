//! Provenance stamps and extraction packages.
//!
//! # Responsibility
//! - Record where, when and with which trust one extraction was made.
//! - Bundle a candidate fact tree with its provenance for ingestion.
//!
//! # Invariants
//! - `retrieved_at` is truncated to microseconds, the precision the store keeps.
//! - `trust_score` is finite and within `[0, 1]`.
//! - Provenance is immutable once constructed.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one ingested package, used in reports and logs.
pub type PackageId = Uuid;

/// Validation failure for provenance construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvenanceError {
    EmptySourceId,
    TrustOutOfRange(f64),
}

impl Display for ProvenanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySourceId => write!(f, "provenance source id must not be empty"),
            Self::TrustOutOfRange(score) => {
                write!(f, "trust score {score} is outside the range [0, 1]")
            }
        }
    }
}

impl Error for ProvenanceError {}

#[derive(Debug, Deserialize)]
struct RawProvenance {
    source_id: String,
    retrieved_at: DateTime<Utc>,
    trust_score: f64,
}

/// Origin, retrieval time and trust of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProvenance")]
pub struct Provenance {
    source_id: String,
    retrieved_at: DateTime<Utc>,
    trust_score: f64,
}

impl Provenance {
    /// Stamps a new provenance record with the current time.
    pub fn new(source_id: impl Into<String>, trust_score: f64) -> Result<Self, ProvenanceError> {
        Self::at(source_id, Utc::now(), trust_score)
    }

    /// Builds provenance for an explicit retrieval time.
    pub fn at(
        source_id: impl Into<String>,
        retrieved_at: DateTime<Utc>,
        trust_score: f64,
    ) -> Result<Self, ProvenanceError> {
        let source_id = source_id.into().trim().to_string();
        if source_id.is_empty() {
            return Err(ProvenanceError::EmptySourceId);
        }
        if !trust_score.is_finite() || !(0.0..=1.0).contains(&trust_score) {
            return Err(ProvenanceError::TrustOutOfRange(trust_score));
        }

        Ok(Self {
            source_id,
            retrieved_at: retrieved_at.trunc_subsecs(6),
            trust_score,
        })
    }

    pub fn source_id(&self) -> &str {
        self.source_id.as_str()
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }
}

impl TryFrom<RawProvenance> for Provenance {
    type Error = ProvenanceError;

    fn try_from(value: RawProvenance) -> Result<Self, Self::Error> {
        Self::at(value.source_id, value.retrieved_at, value.trust_score)
    }
}

/// Candidate fact tree bundled with the provenance of its extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPackage<T> {
    #[serde(default = "Uuid::new_v4")]
    pub package_id: PackageId,
    pub provenance: Provenance,
    pub data: T,
}

impl<T> ExtractionPackage<T> {
    pub fn new(provenance: Provenance, data: T) -> Self {
        Self {
            package_id: Uuid::new_v4(),
            provenance,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Provenance, ProvenanceError};
    use chrono::{TimeZone, Timelike, Utc};

    #[test]
    fn truncates_retrieval_time_to_microseconds() {
        let at = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let provenance = Provenance::at("https://a.example/", at, 0.9).unwrap();
        assert_eq!(provenance.retrieved_at().nanosecond(), 123_456_000);
    }

    #[test]
    fn rejects_trust_outside_unit_interval() {
        let err = Provenance::new("https://a.example/", 1.5).unwrap_err();
        assert_eq!(err, ProvenanceError::TrustOutOfRange(1.5));
        assert!(Provenance::new("https://a.example/", f64::NAN).is_err());
    }

    #[test]
    fn rejects_blank_source() {
        let err = Provenance::new("   ", 0.5).unwrap_err();
        assert_eq!(err, ProvenanceError::EmptySourceId);
    }

    #[test]
    fn deserialization_applies_validation() {
        let parsed: Result<Provenance, _> = serde_json::from_str(
            r#"{"source_id":"https://a.example/","retrieved_at":"2024-01-01T00:00:00Z","trust_score":2.0}"#,
        );
        assert!(parsed.is_err());
    }
}
