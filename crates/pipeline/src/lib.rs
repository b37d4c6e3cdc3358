//! Pipeline - Scan ingestion, dedup, and ack-driven delivery

mod dedup;
mod dispatcher;
mod encoder;
mod ingest;
mod queue;
mod runtime;

pub use dedup::DedupTracker;
pub use dispatcher::{DispatchPhase, Dispatcher, Effect, PipelineSnapshot, ScanReason};
pub use encoder::{encode_network, is_encrypted, signal_quality};
pub use ingest::BatchIngestor;
pub use queue::DeliveryQueue;
pub use runtime::{Mailbox, PipelineEvent, PipelineHandle, PipelineRuntime};
