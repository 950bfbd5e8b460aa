use std::path::PathBuf;
use std::process::ExitCode;
use clap::Parser;
use log::{error, info};
use battlebot_remote::{init_logging, run};
use battlebot_remote::error::{AppRunError, ConfigError};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Drive a bluetooth LE battle robot from the console.\n\nExample: battlebot-remote --address AA:BB:CC:DD:EE:FF", long_about = None)]
struct Args {
    /// Address (or platform id) of the robot. Remembered for the next start.
    #[arg(long)]
    address: Option<String>,

    /// Use this config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug messages
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = init_logging(args.verbose) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }
    info!(concat!("Battlebot remote ", env!("CARGO_PKG_VERSION")));

    match run(args.address, args.config).await {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("This application has already been started");
            ExitCode::FAILURE
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            ExitCode::FAILURE
        },
        Ok(_) => ExitCode::SUCCESS,
    }
}
