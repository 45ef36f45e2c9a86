//! Structured logging setup.
//!
//! One logger per named subsystem, each writing to `Logs/<name>.log`, built
//! on `tracing` + `tracing-subscriber` + `tracing-appender`. A combined
//! stdout layer at `info` (or `$RUST_LOG`) runs alongside the per-subsystem
//! file layers.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const SUBSYSTEMS: &[(&str, &str)] =
    &[("FRONTIER", "frontier"), ("ANALYTICS", "analytics"), ("SCRAPER", "scraper"), ("WORKER", "worker"), ("CACHE", "cache_client")];

/// Initializes the global tracing subscriber. Keep the returned guards
/// alive for the process lifetime, or buffered log lines are lost on exit.
pub fn init() -> std::io::Result<Vec<WorkerGuard>> {
    std::fs::create_dir_all("Logs")?;

    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    for (name, module) in SUBSYSTEMS {
        let appender = tracing_appender::rolling::never("Logs", format!("{name}.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let target_prefix = format!("domaincrawl::{module}");
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(filter_fn(move |metadata| metadata.target().starts_with(&target_prefix)));
        layers.push(Box::new(layer));
    }

    let stdout_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    layers.push(Box::new(fmt::layer().with_filter(stdout_filter)));

    tracing_subscriber::registry().with(layers).init();

    Ok(guards)
}
