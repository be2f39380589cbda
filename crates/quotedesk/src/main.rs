//! quotedesk - quotation locking and version history server.
//!
//! The binary loads layered configuration, starts the HTTP API and writes an
//! activity log for every lock and version change.

mod commands;

use clap::{Parser, Subcommand};
use commands::{init_logging, run_server, show_config};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "quotedesk")]
#[command(author, version, about = "Quotation locking and version history server", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append logs to the default log file
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides `server.address` from config)
        #[arg(short, long)]
        address: Option<SocketAddr>,
    },
    /// Show configuration
    Config,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Serve { address } => {
            let (config, sources) = quotedesk_core::Config::load(Some(cwd.as_path())).await?;
            let log_file = init_logging(cli.verbose, cli.log_file, config.log_level)?;
            if let Some(path) = log_file {
                tracing::info!(path = %path.display(), "Logging to file");
            }
            for source in &sources {
                tracing::debug!(path = %source.display(), "Loaded config");
            }
            run_server(config, address).await
        }
        Commands::Config => show_config(&cwd).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Print version information.
fn print_version() {
    println!("quotedesk {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Exclusive editing locks and version history for quotations.");
}
