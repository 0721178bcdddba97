//! Stepwise CLI
//!
//! Main entry point for running the Stepwise learning server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use stepwise_engine::{
    create_router, AppState, Config, GenerationClient, HttpGenerationClient, LearningEngine,
    PassageRetriever, Retrieval,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Stepwise - adaptive textbook learning server
///
/// Places learners with a short assessment, then serves lessons of short,
/// validated learning steps generated at their comprehension level.
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: stepwise.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind the HTTP API server to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Generation endpoint (overrides generation.endpoint)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Generation model (overrides generation.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Directory of textbook passages; enables retrieval
    #[arg(long, value_name = "DIR")]
    passages: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Stepwise starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, wires the engine, and serves until Ctrl+C.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref endpoint) = args.endpoint {
        config.generation.endpoint.clone_from(endpoint);
    }
    if let Some(ref model) = args.model {
        config.generation.model.clone_from(model);
    }
    if let Some(ref passages) = args.passages {
        config.retrieval.enabled = true;
        config.retrieval.passages_dir.clone_from(passages);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let client: Arc<dyn GenerationClient> = Arc::new(HttpGenerationClient::new(
        &config.generation.endpoint,
        &config.generation.model,
        config.generation.temperature,
    )?);
    let retrieval = build_retrieval(&config);
    let engine = Arc::new(LearningEngine::from_config(&config, client, retrieval));

    let sweeper = spawn_sweeper(Arc::clone(&engine), &config);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid bind address '{}:{}': {e}\n\nSuggestion: Use an IP address with --host, e.g. 127.0.0.1",
            args.host,
            args.port
        )
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    let router = create_router(AppState::shared(engine));
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    served.map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

    tracing::info!("Stepwise stopped");
    Ok(())
}

/// Loads configuration from the specified path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    let config = match config_path {
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: {}\n\nSuggestion: Check the path or omit --config to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };
    Ok(config)
}

/// Builds the retrieval capability. Load failures disable retrieval.
fn build_retrieval(config: &Config) -> Retrieval {
    if !config.retrieval.enabled {
        return Retrieval::Absent;
    }

    let dir: PathBuf = config.retrieval.passages_path();
    match PassageRetriever::load_dir(&dir) {
        Ok(retriever) if !retriever.is_empty() => {
            Retrieval::present(Arc::new(retriever), config.retrieval.top_k)
        }
        Ok(_) => {
            tracing::warn!(dir = %dir.display(), "No passages found; continuing without retrieval");
            Retrieval::Absent
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to load passages; continuing without retrieval");
            Retrieval::Absent
        }
    }
}

/// Spawns the periodic idle-session sweeper.
fn spawn_sweeper(engine: Arc<LearningEngine>, config: &Config) -> tokio::task::JoinHandle<()> {
    let period = config.session.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            engine.sweep().await;
        }
    })
}

/// Resolves when Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    println!();
    println!("Shutting down...");
}

/// Prints the effective configuration.
fn print_config(config: &Config) {
    println!("Configuration:");
    println!("  Generation endpoint: {}", config.generation.endpoint);
    println!("  Model:               {}", config.generation.model);
    println!("  Call timeout:        {}ms", config.generation.call_timeout_ms);
    println!("  Max attempts:        {}", config.generation.max_attempts);
    if config.retrieval.enabled {
        println!(
            "  Retrieval:           {} (top {})",
            config.retrieval.passages_dir, config.retrieval.top_k
        );
    } else {
        println!("  Retrieval:           disabled");
    }
    println!("  Session idle TTL:    {}s", config.session.idle_ttl_secs);
}
