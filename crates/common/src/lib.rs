//! Detective Common - Shared types and traits
//!
//! This crate provides the record types, pipeline options, errors, and
//! collaborator traits used across the wifi-detective workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{DetectiveError, DetectiveResult};
pub use traits::{AckSink, ScanSource, Transport};
pub use types::{
    DeliveryStats, NetworkRecord, PipelineOptions, RawNetwork, RecordKind, WireRecord,
    DEFAULT_COMPANION_APP, DEFAULT_QUEUE_CAPACITY, WEAK_SIGNAL_DBM,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
