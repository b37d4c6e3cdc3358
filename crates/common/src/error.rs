//! Error types for wifi-detective
//!
//! The delivery core itself has no error channel; these cover the edges
//! (scan sources, transports, configuration).

use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum DetectiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Receiver {0} not connected")]
    NotConnected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline stopped")]
    PipelineStopped,
}

/// Result type alias for wifi-detective operations
pub type DetectiveResult<T> = Result<T, DetectiveError>;
