//! dctmd - DC/TMD criteria evaluation and decision sync CLI
//!
//! ## Commands
//!
//! - `evaluate`: Evaluate questionnaire and examination files against the catalog
//! - `regions`: Show per-location display statuses and positive groupings
//! - `sync`: Recompute a patient's diagnoses and persist the computed statuses
//! - `results`: Show a patient's persisted, decision-aware rows
//! - `decide`: Confirm or clear the practitioner decision on one row
//! - `purge`: Delete every persisted row for a patient

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Level};

use dctmd_core::display::{
    decision_views, render_decisions, render_location_statuses, render_summaries, summarize,
};
use dctmd_core::{
    evaluate_all, flatten, group_by_location, location_statuses, map_criteria_data,
    positive_groups, DiagnosisCatalog, DiagnosisEvaluationResult, DiagnosisResultStore,
    PatientRecordId, PractitionerDecision, SqAnswers, SyncEngine,
};
use dctmd_state::SurrealResultStore;

#[derive(Parser)]
#[command(name = "dctmd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "DC/TMD criteria evaluation and decision sync", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Diagnosis catalog JSON file (default: built-in reference catalog)
    #[arg(long, global = true, env = "DCTMD_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
struct Inputs {
    /// Questionnaire answers JSON file (flat question id -> answer)
    #[arg(long)]
    sq: PathBuf,

    /// Examination form values JSON file
    #[arg(long)]
    exam: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every catalog diagnosis for one set of inputs
    Evaluate {
        #[command(flatten)]
        inputs: Inputs,

        /// Collapse parent/subtype families
        #[arg(long)]
        flat: bool,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Per-location display statuses and positive groupings
    Regions {
        #[command(flatten)]
        inputs: Inputs,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Recompute and persist computed statuses for a patient
    Sync {
        /// Patient record id (a new one is generated if omitted)
        #[arg(long)]
        patient: Option<String>,

        #[command(flatten)]
        inputs: Inputs,
    },

    /// Show persisted rows for a patient
    Results {
        #[arg(long)]
        patient: String,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Confirm or clear the practitioner decision on one row
    Decide {
        #[arg(long)]
        patient: String,

        /// Result id, or a unique prefix of one
        #[arg(long)]
        result: String,

        /// Clear the decision instead of confirming
        #[arg(long)]
        clear: bool,

        /// Deciding practitioner
        #[arg(long, env = "DCTMD_USER")]
        user: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Delete every persisted row for a patient
    Purge {
        #[arg(long)]
        patient: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    dctmd_core::init_tracing(cli.json, level);

    let catalog = Arc::new(load_catalog(cli.catalog.as_deref())?);

    let output = match cli.command {
        Commands::Evaluate {
            inputs,
            flat,
            format,
        } => cmd_evaluate(&catalog, &inputs, flat, format)?,
        Commands::Regions { inputs, format } => cmd_regions(&catalog, &inputs, format)?,
        Commands::Sync { patient, inputs } => {
            cmd_sync(&connect(catalog).await?, patient.as_deref(), &inputs).await?
        }
        Commands::Results { patient, format } => {
            cmd_results(&connect(catalog).await?, &patient, format).await?
        }
        Commands::Decide {
            patient,
            result,
            clear,
            user,
            note,
        } => cmd_decide(&connect(catalog).await?, &patient, &result, clear, &user, note).await?,
        Commands::Purge { patient } => cmd_purge(&connect(catalog).await?, &patient).await?,
    };

    print!("{output}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

fn load_catalog(path: Option<&Path>) -> Result<DiagnosisCatalog> {
    match path {
        Some(path) => DiagnosisCatalog::from_path(path)
            .with_context(|| format!("Failed to load catalog {:?}", path)),
        None => Ok(DiagnosisCatalog::reference()),
    }
}

async fn connect(catalog: Arc<DiagnosisCatalog>) -> Result<SyncEngine<SurrealResultStore>> {
    let store = SurrealResultStore::from_env()
        .await
        .context("Failed to connect to the result store")?;
    Ok(SyncEngine::new(Arc::new(store), catalog))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn read_inputs(inputs: &Inputs) -> Result<(SqAnswers, Value)> {
    let sq: SqAnswers = read_json_file(&inputs.sq)?;
    let exam = match &inputs.exam {
        Some(path) => read_json_file(path)?,
        None => Value::Object(Default::default()),
    };
    Ok((sq, exam))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

// ---------------------------------------------------------------------------
// Stateless commands
// ---------------------------------------------------------------------------

fn evaluate_inputs(
    catalog: &DiagnosisCatalog,
    inputs: &Inputs,
) -> Result<Vec<DiagnosisEvaluationResult>> {
    let (sq, exam) = read_inputs(inputs)?;
    Ok(evaluate_all(catalog, &map_criteria_data(&sq, &exam)))
}

fn cmd_evaluate(
    catalog: &DiagnosisCatalog,
    inputs: &Inputs,
    flat: bool,
    format: OutputFormat,
) -> Result<String> {
    let mut results = evaluate_inputs(catalog, inputs)?;
    if flat {
        results = flatten(&results, &catalog.hierarchy());
    }
    match format {
        OutputFormat::Json => to_json(&results),
        OutputFormat::Text => Ok(render_summaries(&summarize(&results, catalog))),
    }
}

#[derive(Serialize)]
struct RegionsOutput {
    locations: Vec<dctmd_core::LocationStatus>,
    positive: Vec<dctmd_core::LocationGroup>,
}

fn cmd_regions(catalog: &DiagnosisCatalog, inputs: &Inputs, format: OutputFormat) -> Result<String> {
    let results = evaluate_inputs(catalog, inputs)?;
    let flat = flatten(&results, &catalog.hierarchy());
    let output = RegionsOutput {
        locations: location_statuses(&results, catalog),
        positive: group_by_location(&positive_groups(&flat)),
    };

    match format {
        OutputFormat::Json => to_json(&output),
        OutputFormat::Text => {
            let mut text = render_location_statuses(&output.locations);
            for group in &output.positive {
                let names: Vec<&str> = group.diagnoses.iter().map(|d| d.as_str()).collect();
                text.push_str(&format!(
                    "+ {}: {}\n",
                    dctmd_core::display::location_label(group.side, group.region),
                    names.join(", ")
                ));
            }
            Ok(text)
        }
    }
}

// ---------------------------------------------------------------------------
// Store-backed commands
// ---------------------------------------------------------------------------

async fn cmd_sync<S: DiagnosisResultStore>(
    engine: &SyncEngine<S>,
    patient: Option<&str>,
    inputs: &Inputs,
) -> Result<String> {
    let pid = match patient {
        Some(id) => PatientRecordId::new(id),
        None => PatientRecordId::new(uuid::Uuid::new_v4().to_string()),
    };
    let (sq, exam) = read_inputs(inputs)?;

    let results = engine
        .recompute_and_persist(&pid, &sq, &exam)
        .await
        .with_context(|| format!("Failed to sync patient {pid}"))?;
    let rows = engine.cached_results(&pid)?;
    info!(patient_record_id = %pid, rows = rows.len(), "patient synced");

    Ok(format!(
        "patient {pid}\n{}",
        render_decisions(&decision_views(&rows, &results))
    ))
}

async fn cmd_results<S: DiagnosisResultStore>(
    engine: &SyncEngine<S>,
    patient: &str,
    format: OutputFormat,
) -> Result<String> {
    let rows = engine
        .fetch_results(&PatientRecordId::new(patient))
        .await
        .context("Failed to fetch results")?;
    let views = decision_views(&rows, &[]);
    match format {
        OutputFormat::Json => to_json(&views),
        OutputFormat::Text => Ok(render_decisions(&views)),
    }
}

async fn cmd_decide<S: DiagnosisResultStore>(
    engine: &SyncEngine<S>,
    patient: &str,
    result: &str,
    clear: bool,
    user: &str,
    note: Option<String>,
) -> Result<String> {
    let rows = engine
        .fetch_results(&PatientRecordId::new(patient))
        .await
        .context("Failed to fetch results")?;

    let prefix = result.to_ascii_lowercase();
    let matches: Vec<_> = rows
        .iter()
        .filter(|r| r.id.as_str().starts_with(&prefix))
        .collect();
    let row = match matches.as_slice() {
        [row] => *row,
        [] => bail!("No result {result:?} for patient {patient}"),
        _ => bail!("Result prefix {result:?} is ambiguous ({} matches)", matches.len()),
    };

    let decision = (!clear).then_some(PractitionerDecision::Confirmed);
    let updated = engine
        .update_decision(&row.id, decision, user, note)
        .await
        .context("Decision was not saved")?;
    Ok(render_decisions(&decision_views(&[updated], &[])))
}

async fn cmd_purge<S: DiagnosisResultStore>(engine: &SyncEngine<S>, patient: &str) -> Result<String> {
    let removed = engine
        .purge_patient(&PatientRecordId::new(patient))
        .await
        .context("Failed to purge patient")?;
    Ok(format!("removed {removed} rows for patient {patient}\n"))
}
