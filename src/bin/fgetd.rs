//! `fgetd` - serve single-file fetch requests from a directory.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fget::server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "fgetd", version, about = "Serve files to fget requesters")]
struct Args {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1024..=64000))]
    port: u16,

    /// Directory served to requesters
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Pending-connection backlog
    #[arg(long, default_value_t = 1)]
    backlog: u32,

    /// Service one connection at a time instead of one task per connection
    #[arg(long)]
    serial: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::new(
        SocketAddr::from(([127, 0, 0, 1], args.port)),
        args.root.clone(),
    );
    config.backlog = args.backlog;
    config.serial = args.serial;

    let server = Server::bind(config)?;
    info!(addr = %server.local_addr()?, root = %args.root.display(), "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            Ok(())
        }
    }
}
