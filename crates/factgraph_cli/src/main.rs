//! Command-line entry point for the fact store.
//!
//! # Responsibility
//! - Ingest pre-extracted packages, replay configured runs, rederive
//!   inferences, inspect and audit entities in a SQLite entity store.
//! - Keep all domain logic in `factgraph_core`.

use clap::{Parser, Subcommand, ValueEnum};
use factgraph_core::db::open_db;
use factgraph_core::{
    default_log_level, ground_package, init_logging, logging_status, BranchData, DocumentSource,
    EntityLabel, EntityRef, EvidenceContainsOracle, ExtractionFailure, ExtractionPackage,
    Extractor, InferenceRule, IngestService, PackagePayload, Pipeline, PipelineConfig,
    ProductData, PropertyStore, RetrievalError, SkipReason, SqlitePropertyStore,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::error::Error;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "factgraph", version, about = "Corroborating fact store", long_about = None)]
struct Cli {
    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ground and ingest one extraction package (JSON: provenance + data)
    Ingest {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, value_enum)]
        kind: PackageKind,
        #[arg(long)]
        package: PathBuf,
        /// Ingest the tree as-is without the evidence containment check
        #[arg(long)]
        skip_grounding: bool,
    },
    /// Replay a configured run over pages saved as extracted JSON trees
    Run {
        #[arg(long)]
        config: PathBuf,
        /// Directory with one `<sanitized source url>.json` file per source
        #[arg(long)]
        pages: PathBuf,
    },
    /// Recompute ADVISES_ON from the current active state
    Rederive {
        #[arg(long)]
        db: PathBuf,
    },
    /// Print an entity snapshot with its full per-source assertion history
    Show {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        label: String,
        #[arg(long)]
        key: String,
    },
    /// Report entities with more than one active assertion
    Audit {
        #[arg(long)]
        db: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PackageKind {
    Product,
    Branch,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Command::Ingest {
            db,
            kind,
            package,
            skip_grounding,
        } => {
            match kind {
                PackageKind::Product => {
                    ingest_file::<ProductData>(&db, &package, skip_grounding)?
                }
                PackageKind::Branch => ingest_file::<BranchData>(&db, &package, skip_grounding)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { config, pages } => run_pipeline(&config, pages),
        Command::Rederive { db } => {
            let mut conn = open_db(&db)?;
            let report = IngestService::new(&mut conn).rederive(&InferenceRule::advises_on())?;
            println!(
                "{}",
                json!({"deleted": report.deleted, "created": report.created})
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { db, label, key } => {
            let label = parse_label(&label)?;
            let conn = open_db(&db)?;
            let store = SqlitePropertyStore::new(&conn);
            let entity = EntityRef::new(label, key);
            let Some(record) = store.get_entity(&entity)? else {
                eprintln!("entity not found: {entity}");
                return Ok(ExitCode::FAILURE);
            };
            let assertions = store.list_assertions(&entity)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "entity": record,
                    "assertions": assertions,
                }))?
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Audit { db } => {
            let conn = open_db(&db)?;
            let violations = SqlitePropertyStore::new(&conn).find_active_edge_violations()?;
            for violation in &violations {
                println!(
                    "{} active_edges={}",
                    violation.entity, violation.active_edges
                );
            }
            if violations.is_empty() {
                println!("ok");
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn ingest_file<T>(db: &Path, package_path: &Path, skip_grounding: bool) -> Result<(), Box<dyn Error>>
where
    T: PackagePayload + DeserializeOwned,
{
    let text = std::fs::read_to_string(package_path)?;
    let mut package: ExtractionPackage<T> = serde_json::from_str(&text)?;
    if !skip_grounding {
        package = ground_package(package, &EvidenceContainsOracle).0;
    }

    let mut conn = open_db(db)?;
    let report = IngestService::new(&mut conn).ingest(&package)?;
    println!(
        "{}",
        json!({
            "package_id": report.package_id.to_string(),
            "source_id": report.source_id,
            "swept": report.swept,
            "won": report.won,
            "lost": report.lost,
            "skipped": report.skipped,
        })
    );
    Ok(())
}

/// Reads each source from `<root>/<sanitized url>.json`.
struct PageDirectory {
    root: PathBuf,
}

impl PageDirectory {
    fn page_path(&self, url: &str) -> PathBuf {
        let file_name: String = url
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl DocumentSource for PageDirectory {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        let path = self.page_path(url);
        std::fs::read_to_string(&path).map_err(|err| RetrievalError {
            message: format!("{}: {err}", path.display()),
        })
    }
}

/// Pages are already extracted; the text is the tree itself.
struct SavedTreeExtractor<T>(PhantomData<T>);

impl<T: DeserializeOwned> Extractor<T> for SavedTreeExtractor<T> {
    fn extract(&self, text: &str) -> Result<T, ExtractionFailure> {
        serde_json::from_str(text).map_err(|err| ExtractionFailure {
            message: err.to_string(),
        })
    }
}

fn run_pipeline(config_path: &Path, pages: PathBuf) -> Result<ExitCode, Box<dyn Error>> {
    let config = PipelineConfig::load(config_path)?;
    if let (None, Some(log_dir)) = (logging_status(), config.log_dir.as_deref()) {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    let documents = PageDirectory { root: pages };
    let products = SavedTreeExtractor::<ProductData>(PhantomData);
    let branches = SavedTreeExtractor::<BranchData>(PhantomData);
    let pipeline = Pipeline {
        documents: &documents,
        products: &products,
        branches: &branches,
        oracle: &EvidenceContainsOracle,
        trust: &config.trust,
    };

    let mut conn = open_db(&config.database_path)?;
    let summary = pipeline.run(&mut conn, &config.product_sources, &config.branch_sources)?;

    let skipped: Vec<_> = summary
        .skipped
        .iter()
        .map(|skipped| json!({"source": skipped.url, "reason": describe_skip(&skipped.reason)}))
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ingested": summary.ingested.len(),
            "skipped": skipped,
            "derived": {"deleted": summary.derived.deleted, "created": summary.derived.created},
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn describe_skip(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Retrieval(err) => err.to_string(),
        SkipReason::Extraction(err) => err.to_string(),
        SkipReason::Provenance(err) => err.to_string(),
        SkipReason::MissingIdentity(label) => format!("{label} has no grounded key"),
    }
}

fn parse_label(value: &str) -> Result<EntityLabel, String> {
    factgraph_core::model::entity::parse_entity_label(value)
        .ok_or_else(|| format!("unknown entity label `{value}`"))
}
