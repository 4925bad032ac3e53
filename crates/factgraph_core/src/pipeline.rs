//! End-to-end ingestion run over configured sources.
//!
//! # Responsibility
//! - Drive fetch -> extract -> ground -> ingest per source, products first.
//! - Recompute derived relationships once all sources are applied.
//!
//! # Invariants
//! - A retrieval, extraction or identity failure skips only that source.
//! - Store failures stop the run and are returned to the caller.
//! - Inference runs after, and outside of, every ingestion transaction.

use crate::config::{ConfigError, TrustPolicy};
use crate::db::DbError;
use crate::grounding::{ground_package, VerificationOracle};
use crate::inference::{InferenceRule, RederiveReport};
use crate::model::entity::EntityLabel;
use crate::model::provenance::{ExtractionPackage, Provenance, ProvenanceError};
use crate::model::schema::{BranchData, ProductData};
use crate::service::ingest_service::{IngestError, IngestReport, IngestService, PackagePayload};
use crate::store::StoreError;
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Document retrieval failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalError {
    pub message: String,
}

impl Display for RetrievalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "document retrieval failed: {}", self.message)
    }
}

impl Error for RetrievalError {}

/// The extractor produced no tree conforming to the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub message: String,
}

impl Display for ExtractionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "extraction failed: {}", self.message)
    }
}

impl Error for ExtractionFailure {}

/// Fetches the visible text of one source.
pub trait DocumentSource {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError>;
}

/// Turns raw text into a candidate tree of shape `T`.
pub trait Extractor<T> {
    fn extract(&self, text: &str) -> Result<T, ExtractionFailure>;
}

/// Run-level failure.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Db(DbError),
    Store(StoreError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for PipelineError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for PipelineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Why a source contributed nothing to the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Retrieval(RetrievalError),
    Extraction(ExtractionFailure),
    Provenance(ProvenanceError),
    MissingIdentity(EntityLabel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSource {
    pub url: String,
    pub reason: SkipReason,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub ingested: Vec<IngestReport>,
    pub skipped: Vec<SkippedSource>,
    pub derived: RederiveReport,
}

/// Wires the external capabilities into one ingestion run.
pub struct Pipeline<'a> {
    pub documents: &'a dyn DocumentSource,
    pub products: &'a dyn Extractor<ProductData>,
    pub branches: &'a dyn Extractor<BranchData>,
    pub oracle: &'a dyn VerificationOracle,
    pub trust: &'a TrustPolicy,
}

impl Pipeline<'_> {
    /// Ingests every product source, then every branch source, then
    /// rederives `ADVISES_ON`.
    pub fn run(
        &self,
        conn: &mut Connection,
        product_sources: &[String],
        branch_sources: &[String],
    ) -> Result<PipelineSummary, PipelineError> {
        let mut summary = PipelineSummary::default();
        let mut service = IngestService::new(conn);

        for url in product_sources {
            self.run_source(&mut service, url, self.products, &mut summary)?;
        }
        for url in branch_sources {
            self.run_source(&mut service, url, self.branches, &mut summary)?;
        }

        summary.derived = service.rederive(&InferenceRule::advises_on())?;
        info!(
            "event=pipeline_run module=pipeline status=ok ingested={} skipped={} derived={}",
            summary.ingested.len(),
            summary.skipped.len(),
            summary.derived.created
        );
        Ok(summary)
    }

    fn run_source<T: PackagePayload>(
        &self,
        service: &mut IngestService<'_>,
        url: &str,
        extractor: &dyn Extractor<T>,
        summary: &mut PipelineSummary,
    ) -> Result<(), PipelineError> {
        let package = match self.prepare(url, extractor) {
            Ok(package) => package,
            Err(reason) => {
                skip(summary, url, reason);
                return Ok(());
            }
        };
        let (package, _) = ground_package(package, self.oracle);

        match service.ingest(&package) {
            Ok(report) => summary.ingested.push(report),
            Err(IngestError::MissingRequiredIdentity { label }) => {
                skip(summary, url, SkipReason::MissingIdentity(label));
            }
            Err(IngestError::Store(err)) => return Err(err.into()),
        }
        Ok(())
    }

    fn prepare<T>(
        &self,
        url: &str,
        extractor: &dyn Extractor<T>,
    ) -> Result<ExtractionPackage<T>, SkipReason> {
        let text = self.documents.fetch(url).map_err(SkipReason::Retrieval)?;
        let data = extractor.extract(&text).map_err(SkipReason::Extraction)?;
        let provenance = Provenance::new(url, self.trust.trust_score(url))
            .map_err(SkipReason::Provenance)?;
        Ok(ExtractionPackage::new(provenance, data))
    }
}

fn skip(summary: &mut PipelineSummary, url: &str, reason: SkipReason) {
    warn!("event=pipeline_source module=pipeline status=skipped source={url} reason={reason:?}");
    summary.skipped.push(SkippedSource {
        url: url.to_string(),
        reason,
    });
}
