//! Renders the crawl analytics report from a saved state file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use domaincrawl::analytics::Analytics;
use domaincrawl::report;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render the crawl analytics report")]
struct Cli {
    #[arg(long, default_value = "analytics/state.pkl")]
    state: PathBuf,

    #[arg(long, default_value = "analytics/report.txt")]
    out: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let out_dir = cli.state.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("analytics"));
    let analytics = Analytics::new(out_dir);

    match report::write_report(&analytics, &cli.out) {
        Ok(()) => {
            println!("Wrote report to {}", cli.out.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to write report: {e}");
            ExitCode::from(2)
        }
    }
}
