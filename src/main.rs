// ABOUTME: Entry point for the flightdeck binary.
// ABOUTME: Parses CLI arguments, loads .env and config, initializes tracing, then serves or answers one question.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flightdeck_agent::create_llm_client;
use flightdeck_agent::tools::schema_for;
use flightdeck_core::{ChatRequest, ToolName};
use flightdeck_server::{AppState, FlightdeckConfig, create_router};

#[derive(Debug, Parser)]
#[command(name = "flightdeck", about = "Ask questions about NYC flights in 2013 in plain English")]
struct Cli {
    /// SQLite database file (overrides FLIGHTDECK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// LLM provider (overrides FLIGHTDECK_DEFAULT_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// LLM model (overrides FLIGHTDECK_DEFAULT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API
    Serve {
        /// Address to listen on (overrides FLIGHTDECK_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Answer one question and print the response as JSON
    Ask {
        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
        #[arg(value_name = "QUESTION", required = true)]
        question: Vec<String>,
    },
    /// Print the schemas of the available tools
    Tools,
    /// Create the empty flights schema in the database file
    InitDb,
    /// Load the dataset CSVs (airlines.csv, airports.csv, ...) into the database
    ImportData {
        /// Directory holding the CSV exports
        #[arg(long)]
        dir: PathBuf,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<FlightdeckConfig> {
    let mut config = FlightdeckConfig::from_env()?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(provider) = &cli.provider {
        config.default_provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        config.default_model = Some(model.clone());
    }
    Ok(config)
}

fn build_state(config: &FlightdeckConfig) -> anyhow::Result<Arc<AppState>> {
    if !config.db_path.exists() {
        tracing::warn!(
            db = %config.db_path.display(),
            "database file not found; queries will fail until it is loaded"
        );
    }
    let llm = create_llm_client(&config.default_provider, config.default_model.as_deref())?;
    tracing::info!(
        provider = llm.provider_name(),
        model = llm.model_name(),
        "language model configured"
    );
    Ok(Arc::new(AppState::from_config(config, llm)?))
}

async fn serve(config: FlightdeckConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    if !state.provider_status.default_available() {
        tracing::warn!(
            provider = %config.default_provider,
            "default provider has no API key configured"
        );
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(bind = %config.bind, "flightdeck listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

async fn ask(
    config: FlightdeckConfig,
    session: Option<String>,
    question: String,
) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let report = state
        .orchestrator
        .handle(
            &state.sessions,
            ChatRequest {
                query: question,
                session_id: session,
            },
        )
        .await;
    println!("{}", serde_json::to_string_pretty(&report.response)?);
    if !report.is_completed() {
        anyhow::bail!(report.response.error.unwrap_or_else(|| "turn failed".to_string()));
    }
    Ok(())
}

fn print_tools(config: &FlightdeckConfig) -> anyhow::Result<()> {
    let schemas: Vec<_> = ToolName::ALL
        .into_iter()
        .filter(|name| *name != ToolName::AnalyzeData || config.enable_analysis)
        .map(schema_for)
        .collect();
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

fn import_data(config: &FlightdeckConfig, dir: &Path) -> anyhow::Result<()> {
    let report = flightdeck_store::import_csv_dir(&config.db_path, dir).with_context(|| {
        format!("failed to import {} into {}", dir.display(), config.db_path.display())
    })?;
    for table in &report.tables {
        println!("{:<10} {:>8}", table.table, table.rows);
    }
    if !report.unknown_carriers.is_empty() {
        println!("carriers missing from airlines: {}", report.unknown_carriers.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("warning: failed to read .env: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("flightdeck=debug,tower_http=debug")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(config).await
        }
        Command::Ask { session, question } => ask(config, session, question.join(" ")).await,
        Command::Tools => print_tools(&config),
        Command::ImportData { dir } => import_data(&config, &dir),
        Command::InitDb => {
            flightdeck_store::create_schema(&config.db_path)
                .with_context(|| format!("failed to initialise {}", config.db_path.display()))?;
            tracing::info!(db = %config.db_path.display(), "flights schema created");
            Ok(())
        }
    }
}
