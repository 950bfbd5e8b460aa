use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

use crate::device::types::ConnectionState;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter available")]
    NoAdapter,

    #[error("Transport has not been initialized")]
    NotInitialized,

    #[error("Peripheral {address} was not found")]
    PeripheralNotFound { address: String },

    #[error("Not connected to a peripheral")]
    NotConnected,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Not ready to send commands (state: {state})")]
    NotReady { state: ConnectionState },

    #[error("A required bluetooth characteristic is not available")]
    CharacteristicUnavailable,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to initialize bluetooth: {source}")]
    TransportInit { source: TransportError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown button {input:?}, expected one of u1, d1, l1, r1, u2, d2, l2, r2")]
    InvalidButton { input: String },

    #[error("Unknown command {input:?}, expected a token such as u1n or r2f")]
    InvalidCommand { input: String },

    #[error("Unknown input {input:?}, type \"help\" for a list of commands")]
    UnknownInput { input: String },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to initialize logging: {source}")]
    Logging { #[from] source: fern::InitError },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("No peripheral address given; pass --address or set peripheralAddress in the config file")]
    NoPeripheral,

    #[error("Failed to read from the console: {source}")]
    Console { #[from] source: io::Error },
}
