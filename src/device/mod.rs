pub mod attributes;
pub mod binder;
pub mod btle;
pub mod command;
pub mod connection;
pub mod constants;
pub mod session;
pub mod throttle;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;
