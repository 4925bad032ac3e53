//! Grounding validator.
//!
//! # Responsibility
//! - Walk a candidate fact tree and remove claims their evidence does not support.
//!
//! # Invariants
//! - Every claim slot is visited exactly once; visits are independent.
//! - Claims with an absent or empty half are removed without an oracle call.
//! - Oracle failures count as "unsupported" (fail closed).
//! - Only claim slots are ever modified.

use crate::model::claim::{AtomicClaim, ClaimVisitor, FactObject};
use crate::model::provenance::ExtractionPackage;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod oracle;

pub use oracle::EvidenceContainsOracle;

/// Failure of one verification call (transport, parse, quota...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleError {
    pub message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for OracleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "verification oracle failed: {}", self.message)
    }
}

impl Error for OracleError {}

/// Decides whether `evidence` supports `value`.
pub trait VerificationOracle {
    fn verify(&self, value: &str, evidence: &str) -> Result<bool, OracleError>;
}

impl<F> VerificationOracle for F
where
    F: Fn(&str, &str) -> Result<bool, OracleError>,
{
    fn verify(&self, value: &str, evidence: &str) -> Result<bool, OracleError> {
        self(value, evidence)
    }
}

/// Per-claim outcome counters of one grounding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroundingReport {
    pub kept: usize,
    pub removed_incomplete: usize,
    pub removed_unsupported: usize,
    pub removed_oracle_error: usize,
}

impl GroundingReport {
    pub fn removed(&self) -> usize {
        self.removed_incomplete + self.removed_unsupported + self.removed_oracle_error
    }
}

struct GroundingVisitor<'o> {
    oracle: &'o dyn VerificationOracle,
    report: GroundingReport,
}

impl ClaimVisitor for GroundingVisitor<'_> {
    fn visit_claim(&mut self, field: &'static str, slot: &mut Option<AtomicClaim>) {
        let Some(claim) = slot.as_ref() else {
            return;
        };
        let Some((value, evidence)) = claim.usable_parts() else {
            debug!("event=grounding module=grounding status=removed reason=incomplete field={field}");
            self.report.removed_incomplete += 1;
            *slot = None;
            return;
        };

        match self.oracle.verify(value, evidence) {
            Ok(true) => {
                debug!("event=grounding module=grounding status=kept field={field}");
                self.report.kept += 1;
            }
            Ok(false) => {
                debug!("event=grounding module=grounding status=removed reason=unsupported field={field}");
                self.report.removed_unsupported += 1;
                *slot = None;
            }
            Err(err) => {
                warn!(
                    "event=grounding module=grounding status=removed reason=oracle_error field={field} error={err}"
                );
                self.report.removed_oracle_error += 1;
                *slot = None;
            }
        }
    }
}

/// Removes every claim in `tree` that `oracle` does not confirm.
pub fn ground<T: FactObject + ?Sized>(
    tree: &mut T,
    oracle: &dyn VerificationOracle,
) -> GroundingReport {
    let mut visitor = GroundingVisitor {
        oracle,
        report: GroundingReport::default(),
    };
    tree.accept(&mut visitor);
    visitor.report
}

/// Grounds the package's tree in place and returns the filtered package.
pub fn ground_package<T: FactObject>(
    mut package: ExtractionPackage<T>,
    oracle: &dyn VerificationOracle,
) -> (ExtractionPackage<T>, GroundingReport) {
    let report = ground(&mut package.data, oracle);
    info!(
        "event=grounding module=grounding status=ok package_id={} source={} kept={} removed={}",
        package.package_id,
        package.provenance.source_id(),
        report.kept,
        report.removed()
    );
    (package, report)
}
