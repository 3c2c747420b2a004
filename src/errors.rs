use std::path::PathBuf;

use thiserror::Error;

/// Represents all possible errors that can occur during the app's lifecycle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing config: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP Status: {0}")]
    HttpStatus(u16),
    #[error("Invalid HTTP header: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
    // My errors
    #[error("Failed to get working directory")]
    WorkDir,
    #[error("Bluetooth is unavailable: {0}")]
    UnsupportedPlatform(String),
    #[error("No Heart Rate device was selected")]
    DeviceNotFound,
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Insight request failed: {0}")]
    Network(String),
}
