use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xhs_api::config::Config;
use xhs_api::web;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

const USAGE: &str = "\
Usage: xhs-api [POST_URL...]

Without arguments, serves the HTTP API on API_HOST:API_PORT.
With post URLs, extracts them as one batch and prints the result as JSON.
Configuration is read from the environment and an optional .env file.";

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Serve,
    Batch(Vec<String>),
    Usage,
}

impl Mode {
    /// Any flag-like argument prints usage instead of being taken as a URL.
    fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let args: Vec<String> = args.into_iter().collect();
        if args.iter().any(|arg| arg.starts_with('-')) {
            Self::Usage
        } else if args.is_empty() {
            Self::Serve
        } else {
            Self::Batch(args)
        }
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let mode = Mode::from_args(std::env::args().skip(1));
    if mode == Mode::Usage {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if config.default_cookies.is_none() {
        warn!("XHS_COOKIES is not set - every request must supply its own cookies");
    }
    if config.proxy_host.is_some() != config.proxy_port.is_some() {
        warn!("PROXY_HOST and PROXY_PORT must both be set - proxy disabled");
    }

    // Post URLs on the command line: run them as one batch and exit.
    if let Mode::Batch(urls) = mode {
        return run_cli_batch(&config, &urls).await;
    }

    info!(
        host = %config.listen_host,
        port = config.listen_port,
        web_base = %config.web_base,
        batch_concurrency = config.batch_concurrency,
        "Starting xhs-api"
    );

    web::serve(config, shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn run_cli_batch(config: &Config, urls: &[String]) -> Result<()> {
    let state = web::AppState::new(config.clone());
    let creds = state
        .credentials(None)
        .context("Command-line mode needs XHS_COOKIES")?;

    let result = state.extractor.run_batch(urls, &creds).await;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize results")?;
    println!("{json}");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,xhs_api=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so command-line output stays clean JSON.
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down...");
}
