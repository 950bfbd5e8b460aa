use std::env;
use std::path::PathBuf;
use log::{error, info};

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::console::run_console;
use crate::device::types::PeripheralHandle;
use crate::error::AppRunError;

pub mod config;
pub mod console;
pub mod device;
pub mod error;

pub fn init_logging(verbose: bool) -> Result<(), AppRunError> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // btleplug is very chatty at debug level
        .level_for("btleplug", log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(fern::log_file(log_file).map_err(fern::InitError::from)?);
    }

    dispatch.apply().map_err(fern::InitError::from)?;
    Ok(())
}

/// Loads the config, remembers `address` if given, and runs the console remote until the user
/// quits.
pub async fn run(address: Option<String>, config_path: Option<PathBuf>) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync(config_path.as_deref())?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let mut config = match config_io.read().await {
        Ok(config) => config,
        Err(err) if err.is_file_not_found_error() => {
            info!("Config file not found, using defaults");
            Config::default()
        },
        Err(err) => {
            error!("Failed to load config: {}", err);
            Config::default()
        },
    };

    if let Some(address) = address {
        if config.peripheral_address.as_deref() != Some(address.as_str()) {
            config.peripheral_address = Some(address);
            config_io.save(&config).await?;
        }
    }

    let peripheral = config
        .peripheral_address
        .clone()
        .map(PeripheralHandle::new)
        .ok_or(AppRunError::NoPeripheral)?;

    run_console(peripheral, config).await
}
