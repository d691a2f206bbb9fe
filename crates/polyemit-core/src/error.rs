use std::path::PathBuf;
use thiserror::Error;

/// Core error type for polyemit operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid extension {value:?} for target {target}")]
    InvalidExtension { target: String, value: String },

    #[error("No targets configured")]
    NoTargets,

    #[error("Malformed source map at {path}: {source}")]
    MapParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported tree root kind {kind} in {path}: expected a single source file")]
    UnsupportedTreeRoot { path: PathBuf, kind: u16 },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for errors that are fatal for one input file but should not
    /// abort the rest of the build.
    #[must_use]
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::UnsupportedTreeRoot { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
