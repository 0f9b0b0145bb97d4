//! zap2xmltv - Zap2it listings to XMLTV
//! Fetches two weeks of TV listings and writes them as an XMLTV guide file,
//! keeping timestamped copies of previous guides.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod epg;
mod error;
mod models;
mod pipeline;

#[cfg(test)]
mod pipeline_tests;

use api::{provider_table, Zap2itClient};
use config::GuideConfig;
use error::GuideError;
use pipeline::Pipeline;

/// Build an XMLTV guide from Zap2it listings
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file (defaults to the user config directory)
    #[arg(short, long, env = "ZAP2XMLTV_CONFIG")]
    config: Option<PathBuf>,

    /// Path of the guide file to write
    #[arg(short, long, default_value = "xmlguide.xmltv")]
    output: PathBuf,

    /// List providers for the configured country and zip code, then exit
    #[arg(short, long)]
    find_id: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), GuideError> {
    let config_path = cli.config.clone().unwrap_or_else(GuideConfig::default_path);
    let config = GuideConfig::load(&config_path)?;
    let client = Zap2itClient::new();

    if cli.find_id {
        config.validate_for_lookup()?;
        let providers = client.find_providers(&config.country, &config.zip_code, &config.language)?;
        print!("{}", provider_table(&providers));
        return Ok(());
    }

    let report = Pipeline::new(client, config, &cli.output).run()?;
    info!(
        channels = report.channels,
        programmes = report.programmes,
        windows = report.windows,
        output = %report.output.display(),
        "guide complete"
    );
    Ok(())
}
