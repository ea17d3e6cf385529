//! Error types for Cipher Bench

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error type shared by every sampler, the reporter and the CLI
#[derive(Error, Debug)]
pub enum BenchError {
    /// The encrypt/decrypt capability failed or returned an unusable result
    #[error("Primitive failure: {0}")]
    Primitive(String),

    /// Process metrics (CPU time, heap tracing) cannot be sampled
    #[error("Metrics unavailable: {0}")]
    MetricsUnavailable(String),

    /// A chart artifact could not be persisted
    #[error("Failed to write artifact {}: {source}", .path.display())]
    ArtifactWrite {
        /// Destination that could not be written
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// A size sweep violates its ordering or positivity rules
    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Whether this error came from the measured primitive rather than the harness
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }
}
