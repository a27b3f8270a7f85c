//! Error type shared by every module of the crate.

use thiserror::Error;
use std::path::PathBuf;

/// Error type for all possible failures in the library.
#[derive(Error, Debug)]
pub enum WebDriverError {
    /// No installed version could be determined, or no compatible driver
    /// version exists remotely.
    #[error("{0}")]
    Version(String),

    #[error("Unable to parse a version from '{input}'")]
    VersionParse {
        input: String,
    },

    /// The remote host is unreachable or the requested resource is missing.
    #[error("Failed to fetch '{url}': {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse JSON response from '{url}': {source}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to execute command '{command}': {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' output could not be parsed: {source}")]
    CommandOutputParsing {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decompress zip file '{path}': {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to write cache file '{path}': {source}")]
    CacheSerialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Driver executable not found at '{path}'")]
    DriverExecutableNotFound {
        path: PathBuf,
    },

    #[error("Invalid value '{value}' for setting {name}")]
    InvalidSetting {
        name: String,
        value: String,
    },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WebDriverError {
    /// True when the failure came from the network rather than from local state.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, WebDriverError::Connection { .. })
    }

    /// True when the host answered that the resource does not exist (a 4xx
    /// status). Unreachable hosts and server errors are not included.
    pub fn is_missing_resource(&self) -> bool {
        match self {
            WebDriverError::Connection { source, .. } => {
                source.status().is_some_and(|status| status.is_client_error())
            }
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WebDriverError::Io {
            path: path.into(),
            source,
        }
    }
}
