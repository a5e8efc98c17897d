//! `coastal-threat` command-line entry point.
//!
//! With no subcommand the HTTP service is started. The other subcommands
//! are offline tools over the same library.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use coastal_threat_service::analysis::peak::{print_summary, summarize};
use coastal_threat_service::api::{serve, AppState, ThreatScoreResponse, CUSTOM_INPUT_LOCATION};
use coastal_threat_service::config::{ScoringConfig, ServiceConfig};
use coastal_threat_service::ingest::prep::prepare_file;
use coastal_threat_service::ingest::table::load_table;
use coastal_threat_service::logging::{init_logging, log_failure, Component};
use coastal_threat_service::model::{SensorReading, ThreatError};
use coastal_threat_service::replay::sequence::order_table;
use coastal_threat_service::threat::score;

#[derive(Parser)]
#[command(name = "coastal-threat")]
#[command(version, about = "Coastal weather threat scoring and replay service", long_about = None)]
struct Cli {
    /// Scoring rules (TOML). Overrides THREAT_SCORING_CONFIG.
    #[arg(short, long)]
    scoring: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve {
        /// Listen address, e.g. 0.0.0.0:7777. Overrides THREAT_BIND_ADDR.
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Clean a raw station export into the processed table
    Prepare {
        #[arg(short, long)]
        input: PathBuf,
        /// Defaults to THREAT_DATA_PATH
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score every row of the processed table and report the peak
    FindPeak {
        /// Defaults to THREAT_DATA_PATH
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Score one reading given as JSON, e.g. '{"wind_speed": 30}'
    Score { reading: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut service = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.scoring {
        service.scoring_config_path = Some(path);
    }

    if let Err(e) = init_logging(&service.log_level, service.log_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(addr) = bind {
                service.bind_addr = addr;
            }
            run_server(service)
        }
        Commands::Prepare { input, output } => {
            let output = output.unwrap_or_else(|| service.data_path.clone());
            prepare_file(&input, &output).map(|summary| {
                println!(
                    "Kept {} of {} rows ({} bad timestamps, {} incomplete)",
                    summary.rows_kept, summary.rows_read, summary.bad_timestamps, summary.incomplete_rows
                );
            })
        }
        Commands::FindPeak { data } => {
            let path = data.unwrap_or_else(|| service.data_path.clone());
            find_peak(&service, &path)
        }
        Commands::Score { reading } => score_once(&service, &reading),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_failure(Component::System, "command", &e);
            ExitCode::FAILURE
        }
    }
}

fn load_scoring(service: &ServiceConfig) -> Result<ScoringConfig, ThreatError> {
    let scoring = ScoringConfig::load_or_builtin(service.scoring_config_path.as_deref())?;
    info!(
        component = %Component::Scoring,
        parameters = scoring.parameters().len(),
        total_weight = scoring.total_weight(),
        source = %service
            .scoring_config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string()),
        "scoring rules loaded"
    );
    Ok(scoring)
}

fn run_server(service: ServiceConfig) -> Result<(), ThreatError> {
    let scoring = Arc::new(load_scoring(&service)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let addr = service.bind_addr.clone();
        let state = Arc::new(AppState::new(scoring, service));

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(component = %Component::System, addr = %addr, "coastal threat service listening");

        serve(listener, state, shutdown_signal()).await
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler keep serving; the process is stopped externally.
        error!(component = %Component::System, "failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    info!(component = %Component::System, "ctrl+c received");
}

fn find_peak(service: &ServiceConfig, path: &std::path::Path) -> Result<(), ThreatError> {
    let scoring = load_scoring(service)?;
    let mut table = load_table(path)?;
    order_table(&mut table);
    print_summary(&summarize(&table, &scoring));
    Ok(())
}

fn score_once(service: &ServiceConfig, json: &str) -> Result<(), ThreatError> {
    let scoring = load_scoring(service)?;
    let reading: SensorReading =
        serde_json::from_str(json).map_err(|e| ThreatError::MalformedReading(e.to_string()))?;
    let response = ThreatScoreResponse::from_assessment(score(&reading, &scoring), CUSTOM_INPUT_LOCATION);
    let text = serde_json::to_string_pretty(&response)
        .map_err(|e| ThreatError::MalformedReading(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
