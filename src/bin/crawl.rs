//! Crawl launcher: wires configuration, logging, the cache client,
//! analytics, and the frontier together, then runs the worker pool to
//! completion.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use domaincrawl::analytics::Analytics;
use domaincrawl::cache_client::CacheClient;
use domaincrawl::config::Config;
use domaincrawl::frontier::Frontier;
use domaincrawl::{logging, worker};

#[derive(Parser, Debug)]
#[command(author, version, about = "Polite, scoped web crawler")]
struct Cli {
    /// Path to the crawler's config.ini.
    #[arg(long, default_value = "config.ini")]
    config_file: PathBuf,

    /// Discard any previous frontier/analytics state and start fresh.
    #[arg(long, default_value_t = false)]
    restart: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guards = match logging::init() {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load(&cli.config_file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.restart {
        clear_analytics_dir();
    }

    let cache = match CacheClient::new(config.cache_server_host.clone(), config.cache_server_port, config.user_agent.clone())
    {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("failed to build cache client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let analytics = Arc::new(Analytics::new("analytics"));

    let frontier =
        match Frontier::open(&PathBuf::from(&config.save_file), &config.seed_urls, cli.restart, config.time_delay).await {
            Ok(f) => Arc::new(f),
            Err(e) => {
                eprintln!("failed to open frontier: {e}");
                return ExitCode::FAILURE;
            }
        };

    worker::run(frontier, cache, analytics.clone(), config.threads_count).await;

    if let Err(e) = analytics.save() {
        tracing::error!(error = %e, "final analytics flush failed");
    }

    ExitCode::SUCCESS
}

/// Keeps analytics in sync with a fresh crawl on `--restart`.
fn clear_analytics_dir() {
    match std::fs::remove_dir_all("analytics") {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(_) => {
            let _ = std::fs::remove_file(std::path::Path::new("analytics").join("state.pkl"));
        }
    }
}
