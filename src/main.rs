use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use synthdata_lib::commands::{self, MetricsPayload, SynthesizePayload};
use synthdata_lib::config::BackendKind;
use synthdata_lib::models::{ApiResponse, ColumnSpec, GenerationRequest, DEFAULT_ROW_COUNT};
use synthdata_lib::utils::init_logging;
use synthdata_lib::{build_service, AppConfig, AppError, AppResult};

#[derive(Parser, Debug)]
#[command(name = "synthdata", version, about = "Synthetic tabular data from an LLM")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage backend (sqlite or document).
    #[arg(long, global = true)]
    backend: Option<BackendKind>,
    /// Path of the database file or directory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Table or collection name.
    #[arg(long, global = true)]
    dataset: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate free-form records with the remote model.
    Generate(GenerateArgs),
    /// Generate metric records with the remote model and store them.
    Metrics(MetricsArgs),
    /// Generate metric records locally and store them.
    Synthesize(SynthesizeArgs),
    /// Print the most recent stored records.
    Data,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    description: String,
    #[arg(long, default_value_t = DEFAULT_ROW_COUNT)]
    rows: u32,
    /// Column as NAME or NAME:TYPE, repeatable.
    #[arg(long = "column", value_name = "NAME[:TYPE]")]
    columns: Vec<String>,
}

#[derive(Args, Debug)]
struct MetricsArgs {
    #[arg(long)]
    data_type: Option<String>,
    #[arg(long)]
    records: Option<u32>,
}

#[derive(Args, Debug)]
struct SynthesizeArgs {
    #[arg(long)]
    records: Option<u32>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    init_logging("info")?;

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let service = build_service(&config)?;

    match cli.command {
        Command::Generate(args) => {
            let columns = args.columns.iter().map(|c| ColumnSpec::from_arg(c)).collect();
            let request = GenerationRequest::new(&args.description, args.rows).with_columns(columns);
            print_response(&commands::generate_data(request, &service).await)
        }
        Command::Metrics(args) => {
            let mut payload = MetricsPayload::default();
            if let Some(data_type) = args.data_type {
                payload.data_type = data_type;
            }
            if let Some(records) = args.records {
                payload.records = records;
            }
            print_response(&commands::generate_metrics(payload, &service).await)
        }
        Command::Synthesize(args) => {
            let mut payload = SynthesizePayload::default();
            if let Some(records) = args.records {
                payload.records = records;
            }
            print_response(&commands::synthesize(payload, &service))
        }
        Command::Data => {
            let metrics = commands::fetch_data(&service)?;
            print_json(&metrics)
        }
    }
}

/// File, then environment, then command-line flags.
fn resolve_config(cli: &Cli) -> AppResult<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Some(store) = &cli.store {
        config.storage.path = Some(store.clone());
    }
    if let Some(dataset) = &cli.dataset {
        config.storage.dataset = dataset.clone();
    }

    Ok(config)
}

fn print_response<T: Serialize>(response: &ApiResponse<T>) -> AppResult<()> {
    print_json(response)?;

    if response.is_success() {
        Ok(())
    } else {
        Err(AppError::Internal(
            response.message.clone().unwrap_or_else(|| "request failed".to_string()),
        ))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| AppError::Internal(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
