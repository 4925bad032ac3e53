//! Corroboration and grounding core for provenance-tagged fact ingestion.
//!
//! Candidate fact trees are grounded against their own evidence, then
//! applied per package to a SQLite entity store where each entity keeps one
//! audit edge per source and exactly one source holds the current truth.

pub mod config;
pub mod corroboration;
pub mod db;
pub mod grounding;
pub mod inference;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod projection;
pub mod service;
pub mod store;

pub use config::{ConfigError, PipelineConfig, TrustPolicy, TrustRule};
pub use corroboration::{corroborate, decide, mark_stale, Outcome};
pub use grounding::{
    ground, ground_package, EvidenceContainsOracle, GroundingReport, OracleError,
    VerificationOracle,
};
pub use inference::{rederive, InferenceRule, RederiveReport, ADVISES_ON};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::claim::{AtomicClaim, EvidenceMap, FactObject, Field, PropertyMap, PropertyValue};
pub use model::entity::{
    AssertionEdge, DerivedRelationship, EntityLabel, EntityRecord, EntityRef, Relation,
};
pub use model::provenance::{ExtractionPackage, Provenance, ProvenanceError};
pub use model::schema::{
    BranchData, BranchModel, ConditionModel, EmployeeModel, FaqModel, ProductData, ProductModel,
    ProductType, ProductTypeModel, RiskClass, RiskClassModel, RoleType,
};
pub use pipeline::{
    DocumentSource, ExtractionFailure, Extractor, Pipeline, PipelineError, PipelineSummary,
    RetrievalError, SkipReason,
};
pub use service::ingest_service::{IngestError, IngestReport, IngestService, PackagePayload};
pub use store::{PropertyStore, SqlitePropertyStore, StoreError, StoreResult};
