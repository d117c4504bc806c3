//! `fget` - request a single file from a responder.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fget::client::{fetch, FetchConfig, FetchOutcome};

#[derive(Parser, Debug)]
#[command(name = "fget", version, about = "Fetch a single file from an fgetd responder")]
struct Args {
    /// Responder hostname or IP address
    address: String,

    /// Responder port
    #[arg(value_parser = clap::value_parser!(u16).range(1024..=64000))]
    port: u16,

    /// Name of the file to request
    filename: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Overwrite guard: never connect if the file is already present locally.
    if Path::new(&args.filename).exists() {
        eprintln!(
            "{}",
            format!("{} already exists locally, refusing to overwrite", args.filename).red()
        );
        return ExitCode::FAILURE;
    }

    let config = FetchConfig::new(args.address, args.port, args.filename);
    match fetch(&config).await {
        Ok(FetchOutcome::Saved {
            payload_bytes,
            total_bytes,
        }) => {
            println!(
                "{} saved: {payload_bytes} payload bytes, {total_bytes} bytes transferred",
                config.filename.green()
            );
            ExitCode::SUCCESS
        }
        Ok(FetchOutcome::NotFound) => {
            println!(
                "{} not found on the responder, nothing written",
                config.filename.yellow()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red());
            ExitCode::FAILURE
        }
    }
}
