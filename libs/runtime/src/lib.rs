//! Process-level runtime support: layered configuration and logging bootstrap.

pub mod config;
pub mod home_dir;
pub mod logging;

pub use config::{AppConfig, CliArgs, DatabaseConfig, LoggingConfig, Section, ServerConfig};
