// hostwatch library - public API

// Re-export error types
pub mod error;
pub use error::{HostwatchError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod ui;
pub mod web;

// Re-export commonly used types
pub use crate::core::config::{FileSettingsStore, Settings, SettingsStore};

// Initialize logging; RUST_LOG still wins over the default level
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
