pub mod barman;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod model;
pub mod platform;
pub mod scheduler;

pub use error::{ExporterError, Result};

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
