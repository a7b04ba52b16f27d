// Command handlers module
pub mod config;
pub mod email;
pub mod report;
pub mod run;
pub mod scan;
pub mod service;
pub mod status;
pub mod targets;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

/// Runtime for the async parts of a command
pub(crate) fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("hostwatch-worker")
        .build()
        .context("Failed to start async runtime")
}
