use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use alpha_motion::config::MachineConfig;

#[derive(Parser)]
#[command(name = "alpha-motion", version, about = "Differential-drive motion control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print package info
    Info,
    /// Run commands
    Run {
        #[command(subcommand)]
        target: RunCommand,
    },
}

#[derive(Subcommand)]
enum RunCommand {
    /// Run the machine: commands in over zenoh, setpoints out to the drives
    Machine(MachineConfig),
}

/// Innermost error in the source chain
fn root_cause<'a>(err: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    let mut cause = err;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    match Cli::parse().command {
        Command::Info => println!("{}", env!("CARGO_PKG_VERSION")),
        Command::Run {
            target: RunCommand::Machine(config),
        } => {
            if let Err(e) = alpha_motion::runtime::run(config).await {
                error!("Machine error: {}", e);
                error!("Root cause: {}", root_cause(&e));
                std::process::exit(1);
            }
        }
    }
}
