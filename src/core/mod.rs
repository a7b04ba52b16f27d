// Core business logic module

pub mod config;
pub mod monitor;

// Re-export commonly used items
pub use config::{FileSettingsStore, Settings, SettingsStore};
