use std::io;
use thiserror::Error;

/// Error type for the hostwatch library
#[derive(Error, Debug)]
pub enum HostwatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to encode settings: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Service control error: {0}")]
    ServiceControl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid threshold {value} for {subject}: must be between 1 and 100")]
    InvalidThreshold { subject: String, value: i64 },

    #[error("Status server error: {0}")]
    Server(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for hostwatch
pub type Result<T> = std::result::Result<T, HostwatchError>;

impl HostwatchError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        HostwatchError::Config(msg.into())
    }

    /// Create a probe error
    pub fn probe<S: Into<String>>(msg: S) -> Self {
        HostwatchError::Probe(msg.into())
    }

    /// Create a service control error
    pub fn service_control<S: Into<String>>(msg: S) -> Self {
        HostwatchError::ServiceControl(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        HostwatchError::Transport(msg.into())
    }

    pub fn server<S: Into<String>>(msg: S) -> Self {
        HostwatchError::Server(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        HostwatchError::Other(msg.into())
    }

    pub fn invalid_threshold<S: Into<String>>(subject: S, value: i64) -> Self {
        HostwatchError::InvalidThreshold {
            subject: subject.into(),
            value,
        }
    }
}
