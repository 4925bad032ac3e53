//! Package ingestion service.
//!
//! # Responsibility
//! - Run the staleness sweep and every per-entity corroboration of one
//!   package inside a single `BEGIN IMMEDIATE` transaction.
//! - Map schema objects to entities, keys and links.
//!
//! # Invariants
//! - A package either commits completely or leaves no trace.
//! - `BEGIN IMMEDIATE` holds the single SQLite writer lock for the whole
//!   read-decide-write sequence, so concurrent packages serialize.
//! - Classification links mirror the winning tree only: replaced when it
//!   carries a class, cleared when it carries none.

use crate::corroboration::{corroborate, mark_stale, Outcome};
use crate::inference::{rederive, InferenceRule, RederiveReport};
use crate::model::claim::{claim_value, FactObject, PropertyValue};
use crate::model::entity::{EntityId, EntityLabel, EntityRef, Relation};
use crate::model::provenance::{ExtractionPackage, PackageId, Provenance};
use crate::model::schema::{BranchData, ConditionModel, ProductData};
use crate::projection::{assertion_properties, node_properties};
use crate::store::{PropertyStore, SqlitePropertyStore, StoreError, StoreResult};
use log::{debug, error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type IngestResult<T> = Result<T, IngestError>;

/// Ingestion failure for one package.
#[derive(Debug)]
pub enum IngestError {
    /// The package's root entity has no usable natural key after grounding.
    MissingRequiredIdentity { label: EntityLabel },
    /// Store failure; the package transaction was rolled back.
    Store(StoreError),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequiredIdentity { label } => {
                write!(f, "{label} has no usable natural key after grounding")
            }
            Self::Store(err) => write!(f, "package transaction rolled back: {err}"),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingRequiredIdentity { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.into())
    }
}

/// Per-package ingestion counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub package_id: PackageId,
    pub source_id: String,
    /// Edges from this source withdrawn by the staleness sweep.
    pub swept: usize,
    pub won: usize,
    pub lost: usize,
    /// Child entities dropped for lack of a usable key.
    pub skipped: usize,
}

impl IngestReport {
    fn new(package_id: PackageId, source_id: &str) -> Self {
        Self {
            package_id,
            source_id: source_id.to_string(),
            swept: 0,
            won: 0,
            lost: 0,
            skipped: 0,
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Won => self.won += 1,
            Outcome::Lost => self.lost += 1,
        }
    }
}

/// Candidate tree shape that knows how to write itself into the store.
pub trait PackagePayload: FactObject {
    /// Label of the entity whose key the whole package depends on.
    const ROOT_LABEL: EntityLabel;
    /// Labels swept for the package's source before applying it.
    const STALE_LABELS: &'static [EntityLabel];

    fn root_key(&self) -> Option<&str>;

    /// Corroborates every entity of the tree and writes its links.
    fn apply<S: PropertyStore>(
        &self,
        store: &S,
        provenance: &Provenance,
        report: &mut IngestReport,
    ) -> StoreResult<()>;
}

impl PackagePayload for ProductData {
    const ROOT_LABEL: EntityLabel = EntityLabel::Product;
    const STALE_LABELS: &'static [EntityLabel] = &[
        EntityLabel::Product,
        EntityLabel::Condition,
        EntityLabel::Faq,
    ];

    fn root_key(&self) -> Option<&str> {
        claim_value(&self.product.name)
    }

    fn apply<S: PropertyStore>(
        &self,
        store: &S,
        provenance: &Provenance,
        report: &mut IngestReport,
    ) -> StoreResult<()> {
        let Some(product_name) = self.root_key() else {
            return Ok(());
        };
        let product = EntityRef::new(EntityLabel::Product, product_name);
        let (outcome, product_id) =
            assert_entity(store, &product, "name", &self.product, provenance, report)?;

        if outcome == Outcome::Won {
            let product_type = self
                .product_type
                .as_ref()
                .map(|model| EntityRef::new(EntityLabel::ProductType, model.name.as_str()));
            classify(store, product_id, Relation::HasProductType, product_type.as_ref())?;
            let risk = self
                .risk_class
                .as_ref()
                .map(|model| EntityRef::new(EntityLabel::RiskClass, model.risk_class.as_str()));
            classify(store, product_id, Relation::HasRiskClass, risk.as_ref())?;
        }

        for condition in self.conditions.iter().flatten() {
            if condition.interest_rate.is_none() {
                debug!("event=ingest_entity module=service status=skipped label=Condition reason=no_interest_rate");
                report.skipped += 1;
                continue;
            }
            let entity = EntityRef::new(EntityLabel::Condition, condition_key(product_name, condition));
            let (_, condition_id) =
                assert_entity(store, &entity, "key", condition, provenance, report)?;
            link(store, product_id, Relation::HasCondition, condition_id)?;
        }

        for faq in self.faqs.iter().flatten() {
            let Some(question) = claim_value(&faq.question) else {
                debug!("event=ingest_entity module=service status=skipped label=FAQ reason=no_question");
                report.skipped += 1;
                continue;
            };
            let entity = EntityRef::new(EntityLabel::Faq, question);
            let (_, faq_id) = assert_entity(store, &entity, "question", faq, provenance, report)?;
            link(store, product_id, Relation::HasFaq, faq_id)?;
        }

        Ok(())
    }
}

impl PackagePayload for BranchData {
    const ROOT_LABEL: EntityLabel = EntityLabel::Branch;
    const STALE_LABELS: &'static [EntityLabel] = &[EntityLabel::Branch, EntityLabel::Employee];

    fn root_key(&self) -> Option<&str> {
        claim_value(&self.branch.name)
    }

    fn apply<S: PropertyStore>(
        &self,
        store: &S,
        provenance: &Provenance,
        report: &mut IngestReport,
    ) -> StoreResult<()> {
        let Some(branch_name) = self.root_key() else {
            return Ok(());
        };
        let branch = EntityRef::new(EntityLabel::Branch, branch_name);
        let (_, branch_id) =
            assert_entity(store, &branch, "name", &self.branch, provenance, report)?;

        for employee in &self.branch.employees {
            let Some(employee_name) = claim_value(&employee.name) else {
                debug!("event=ingest_entity module=service status=skipped label=Employee reason=no_name");
                report.skipped += 1;
                continue;
            };
            let entity = EntityRef::new(EntityLabel::Employee, employee_name);
            let (outcome, employee_id) =
                assert_entity(store, &entity, "name", employee, provenance, report)?;
            link(store, employee_id, Relation::WorksIn, branch_id)?;
            if outcome == Outcome::Won {
                let class = EntityRef::new(EntityLabel::RoleType, employee.role_type.as_str());
                classify(store, employee_id, Relation::HasRoleType, Some(&class))?;
            }
        }

        Ok(())
    }
}

/// Ingestion facade over one SQLite connection.
pub struct IngestService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> IngestService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Applies one grounded package atomically.
    ///
    /// # Errors
    /// - `MissingRequiredIdentity` before any transaction is opened.
    /// - `Store` after the transaction was rolled back.
    pub fn ingest<T: PackagePayload>(
        &mut self,
        package: &ExtractionPackage<T>,
    ) -> IngestResult<IngestReport> {
        let started_at = Instant::now();
        let source_id = package.provenance.source_id();
        info!(
            "event=ingest_package module=service status=start package_id={} source={source_id} root={}",
            package.package_id,
            T::ROOT_LABEL
        );

        if package.data.root_key().is_none() {
            warn!(
                "event=ingest_package module=service status=skipped package_id={} source={source_id} reason=missing_identity label={}",
                package.package_id,
                T::ROOT_LABEL
            );
            return Err(IngestError::MissingRequiredIdentity {
                label: T::ROOT_LABEL,
            });
        }

        match apply_package(self.conn, package) {
            Ok(report) => {
                info!(
                    "event=ingest_package module=service status=ok package_id={} source={source_id} swept={} won={} lost={} skipped={} duration_ms={}",
                    report.package_id,
                    report.swept,
                    report.won,
                    report.lost,
                    report.skipped,
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=ingest_package module=service status=error package_id={} source={source_id} duration_ms={} error={err}",
                    package.package_id,
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    /// Corroborates one condition under explicit provenance and links it to
    /// its product when the product exists.
    ///
    /// The source's other `Condition` edges are swept first, as for a package.
    pub fn ingest_condition(
        &mut self,
        product_name: &str,
        condition: &ConditionModel,
        provenance: &Provenance,
    ) -> IngestResult<Outcome> {
        let started_at = Instant::now();
        let source_id = provenance.source_id();
        info!(
            "event=ingest_condition module=service status=start product={product_name} source={source_id}"
        );

        if condition.interest_rate.is_none() {
            warn!(
                "event=ingest_condition module=service status=skipped product={product_name} source={source_id} reason=missing_identity"
            );
            return Err(IngestError::MissingRequiredIdentity {
                label: EntityLabel::Condition,
            });
        }

        match apply_condition(self.conn, product_name, condition, provenance) {
            Ok(outcome) => {
                info!(
                    "event=ingest_condition module=service status=ok product={product_name} source={source_id} outcome={} duration_ms={}",
                    outcome.as_str(),
                    started_at.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    "event=ingest_condition module=service status=error product={product_name} source={source_id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    /// Recomputes one inference rule over the committed active state.
    pub fn rederive(&mut self, rule: &InferenceRule) -> StoreResult<RederiveReport> {
        rederive(self.conn, rule)
    }
}

/// Natural key of a condition: `{product}_{min_amount}_{term_years}`.
///
/// Absent numbers render as `None` so keys stay stable across sources.
pub fn condition_key(product_name: &str, condition: &ConditionModel) -> String {
    format!(
        "{product_name}_{}_{}",
        render_optional(condition.min_amount),
        render_optional(condition.term_years)
    )
}

fn render_optional(value: Option<i64>) -> String {
    value.map_or_else(|| "None".to_string(), |number| number.to_string())
}

fn apply_package<T: PackagePayload>(
    conn: &mut Connection,
    package: &ExtractionPackage<T>,
) -> StoreResult<IngestReport> {
    let provenance = &package.provenance;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let store = SqlitePropertyStore::new(&tx);
    let mut report = IngestReport::new(package.package_id, provenance.source_id());

    report.swept = mark_stale(&store, provenance.source_id(), T::STALE_LABELS)?;
    package.data.apply(&store, provenance, &mut report)?;

    tx.commit()?;
    Ok(report)
}

fn apply_condition(
    conn: &mut Connection,
    product_name: &str,
    condition: &ConditionModel,
    provenance: &Provenance,
) -> StoreResult<Outcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let store = SqlitePropertyStore::new(&tx);
    let mut report = IngestReport::new(PackageId::nil(), provenance.source_id());

    mark_stale(&store, provenance.source_id(), &[EntityLabel::Condition])?;
    let entity = EntityRef::new(EntityLabel::Condition, condition_key(product_name, condition));
    let (outcome, condition_id) =
        assert_entity(&store, &entity, "key", condition, provenance, &mut report)?;

    let product = EntityRef::new(EntityLabel::Product, product_name);
    if let Some(record) = store.get_entity(&product)? {
        link(&store, record.entity_id, Relation::HasCondition, condition_id)?;
    }
    tx.commit()?;
    Ok(outcome)
}

fn assert_entity<S: PropertyStore>(
    store: &S,
    entity: &EntityRef,
    key_field: &str,
    object: &dyn FactObject,
    provenance: &Provenance,
    report: &mut IngestReport,
) -> StoreResult<(Outcome, EntityId)> {
    let mut properties = node_properties(object);
    properties.insert(
        key_field.to_string(),
        PropertyValue::from(entity.natural_key.as_str()),
    );
    let evidence = assertion_properties(object);

    let (outcome, entity_id) = corroborate(store, entity, &properties, &evidence, provenance)?;
    report.record(outcome);
    Ok((outcome, entity_id))
}

fn link<S: PropertyStore>(
    store: &S,
    from: EntityId,
    relation: Relation,
    to: EntityId,
) -> StoreResult<()> {
    if relation.is_classification() {
        store.replace_link(from, relation, to)
    } else {
        store.merge_link(from, relation, to)
    }
}

/// Points `relation` of a winning entity at `class`, or drops it when the
/// winning tree carries no classification.
fn classify<S: PropertyStore>(
    store: &S,
    from: EntityId,
    relation: Relation,
    class: Option<&EntityRef>,
) -> StoreResult<()> {
    match class {
        Some(class) => {
            let class_id = store.upsert_entity(class)?;
            link(store, from, relation, class_id)
        }
        None => {
            let removed = store.clear_links(from, relation)?;
            if removed > 0 {
                debug!(
                    "event=ingest_entity module=service status=ok relation={} cleared={removed}",
                    relation.as_str()
                );
            }
            Ok(())
        }
    }
}
