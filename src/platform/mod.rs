// Platform-specific code module

pub mod services;

pub use services::{ServiceAction, ServiceState};
