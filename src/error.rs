use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to spawn '{name}': {source}")]
    SpawnFailure {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("Server did not become ready on port {port} after {attempts} attempts")]
    HealthCheckTimeout { port: u16, attempts: u32 },
    #[error("Command execution error: '{cmd}': {reason}")]
    ExecutionFailure { cmd: String, reason: String },
    #[error("Failed to write {path}: {source}")]
    OutputWriteFailure {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
