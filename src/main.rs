use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use species_recognition_server::config;
use species_recognition_server::image_ledger::{ImageLedger, SqliteImageLedger};
use species_recognition_server::recognition::{OpenAiRecognitionClient, RecognitionOrchestrator};
use species_recognition_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use species_recognition_server::species_catalog::SqliteSpeciesCatalog;
use species_recognition_server::worker::QueueWorker;

/// Environment variable read for the recognition API key.
const API_KEY_ENV_VAR: &str = "RECOGNITION_API_KEY";

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the database files (images.db, species.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL that relative image paths are resolved against before being
    /// sent to the recognition service.
    #[clap(long)]
    pub public_base_url: Option<String>,

    /// Root of the OpenAI-compatible recognition API.
    #[clap(long)]
    pub recognition_api_url: Option<String>,

    /// Model used for identification and enrichment.
    #[clap(long)]
    pub recognition_model: Option<String>,

    /// Wait between polls when no image is queued, in milliseconds.
    #[clap(long)]
    pub idle_interval_ms: Option<u64>,

    /// Do not start the recognition worker at boot.
    #[clap(long)]
    pub no_autostart: bool,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            public_base_url: args.public_base_url.clone(),
            recognition_api_url: args.recognition_api_url.clone(),
            recognition_model: args.recognition_model.clone(),
            recognition_api_key: std::env::var(API_KEY_ENV_VAR).ok().filter(|k| !k.is_empty()),
            idle_interval_ms: args.idle_interval_ms,
            no_autostart: args.no_autostart,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = config::AppConfig::resolve(&(&cli_args).into(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let image_ledger = Arc::new(SqliteImageLedger::new(app_config.images_db_path())?);
    let species_catalog = Arc::new(SqliteSpeciesCatalog::new(app_config.species_db_path())?);

    let stuck = image_ledger.count_by_status()?.processing;
    if stuck > 0 {
        warn!(
            "{} images are stuck in PROCESSING from a previous run and will not be retried automatically",
            stuck
        );
    }

    let recognition = &app_config.recognition;
    let client = OpenAiRecognitionClient::from_settings(recognition);
    info!(
        "Recognition client: {} (model {})",
        recognition.api_url,
        client.model()
    );

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        image_ledger.clone(),
        species_catalog.clone(),
        Arc::new(client),
        app_config.public_base_url.clone(),
    ));
    let worker = QueueWorker::new(orchestrator, recognition.idle_interval());
    if recognition.autostart {
        worker.start();
    } else {
        info!("Recognition worker autostart disabled");
    }

    let state = ServerState::new(
        ServerConfig {
            requests_logging_level: app_config.logging_level.clone(),
            port: app_config.port,
            metrics_port: app_config.metrics_port,
        },
        image_ledger,
        species_catalog,
        worker.clone(),
    );

    let shutdown_token = CancellationToken::new();

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let result = tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    worker.shutdown().await;
    result
}
