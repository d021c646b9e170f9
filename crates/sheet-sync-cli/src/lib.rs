//! sheet-sync command line: one-shot and recurring syncs, offline
//! formatting, and a reference spreadsheet endpoint.

pub mod commands;
pub mod config;
#[cfg(feature = "endpoint")]
pub mod endpoint;
pub mod output;

pub use config::{resolve_config, resolve_config_path, FlagOverrides};
pub use output::Output;
