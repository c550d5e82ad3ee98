mod commands;
mod prompt;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Provision a complete application stack on DigitalOcean", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the infrastructure described by a configuration file
    Deploy {
        /// Configuration file (JSON or YAML). Discovered when omitted.
        config: Option<PathBuf>,
        /// Delete created resources right away if a mandatory phase fails
        #[arg(long)]
        cleanup_on_error: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Application directory to install once the instance is reachable
        #[arg(long)]
        app_dir: Option<PathBuf>,
    },
    /// Delete the resources recorded in .shipyard/state.json
    Cleanup {
        /// Delete without asking, including the domain and the SSH key
        #[arg(short, long)]
        yes: bool,
    },
    /// Show what a deployment would create without calling the provider
    Plan {
        /// Configuration file (JSON or YAML). Discovered when omitted.
        config: Option<PathBuf>,
    },
    /// Show the recorded deployment state
    Status,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), error_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// Library errors already carry their cause in the message, so the chain is
/// not appended again
fn error_message(e: &anyhow::Error) -> String {
    e.to_string()
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let project_root = std::env::current_dir()?;

    match cli.command {
        Commands::Deploy {
            config,
            cleanup_on_error,
            yes,
            app_dir,
        } => {
            commands::deploy::handle(&project_root, config, cleanup_on_error, yes, app_dir).await
        }
        Commands::Cleanup { yes } => commands::cleanup::handle(&project_root, yes).await,
        Commands::Plan { config } => commands::plan::handle(config),
        Commands::Status => commands::status::handle(&project_root).await,
        Commands::Version => {
            println!("shipyard {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}
