// crates/pipeline/src/dispatcher.rs
//! Ack-driven dispatcher - the delivery state machine
//!
//! Every inbound event (toggle, scan result, ack) is applied to completion
//! and answered with the effects the caller must carry out. The dispatcher
//! itself performs no I/O, which keeps it single-writer and easy to test.

use detective_common::{DeliveryStats, PipelineOptions, RawNetwork, WireRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::ingest::BatchIngestor;

/// Where the dispatcher is in its send/ack cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// Not delivering. Also the phase between activation and the first batch.
    Idle,
    /// One record is out, waiting for its ack.
    AwaitingAck,
    /// Queue drained, a new scan has been requested.
    DrainedWaitingScan,
}

/// Why a scan is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    Activation,
    Drained,
}

/// Side effect requested by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(WireRecord),
    RequestScan(ScanReason),
    LaunchCompanion,
    CloseCompanion,
}

/// Point-in-time view of the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub phase: DispatchPhase,
    pub active: bool,
    pub in_flight: bool,
    pub queued: usize,
    pub alerted_networks: usize,
    pub stats: DeliveryStats,
}

/// Delivery state machine: dedup set, queue, and pipeline state.
#[derive(Debug)]
pub struct Dispatcher {
    ingestor: BatchIngestor,
    phase: DispatchPhase,
    active: bool,
    in_flight: bool,
    max_batches: Option<u64>,
    finished: bool,
    stats: DeliveryStats,
}

impl Dispatcher {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            ingestor: BatchIngestor::new(options.queue_capacity.max(1)),
            phase: DispatchPhase::Idle,
            active: false,
            in_flight: false,
            max_batches: options.max_batches,
            finished: false,
            stats: DeliveryStats::default(),
        }
    }

    /// Activation control entry point.
    pub fn on_toggle(&mut self, active: bool) -> Vec<Effect> {
        if active {
            self.activate()
        } else {
            self.deactivate()
        }
    }

    /// Arm the pipeline and ask for the first scan.
    pub fn activate(&mut self) -> Vec<Effect> {
        if self.active {
            debug!("Activation ignored, pipeline already active");
            return Vec::new();
        }
        info!("Pipeline activated");
        self.active = true;
        self.finished = false;
        // a record sent before the last deactivation is still owed an ack
        self.phase = if self.in_flight {
            DispatchPhase::AwaitingAck
        } else {
            DispatchPhase::Idle
        };
        self.stats.scans_requested += 1;
        vec![
            Effect::LaunchCompanion,
            Effect::RequestScan(ScanReason::Activation),
        ]
    }

    /// Disarm. Later acks and late scan results are ignored.
    pub fn deactivate(&mut self) -> Vec<Effect> {
        if !self.active {
            debug!("Deactivation ignored, pipeline already idle");
            return Vec::new();
        }
        info!("Pipeline deactivated");
        self.active = false;
        self.phase = DispatchPhase::Idle;
        vec![Effect::CloseCompanion]
    }

    /// Scan source entry point.
    pub fn on_scan_complete(&mut self, raw: &[RawNetwork]) -> Option<Effect> {
        self.on_batch_received(raw)
    }

    /// Replace the pending batch and start sending it.
    ///
    /// With a record already in flight the new batch is only queued; its
    /// Cleanup goes out on the next ack.
    pub fn on_batch_received(&mut self, raw: &[RawNetwork]) -> Option<Effect> {
        if !self.active {
            self.stats.late_batches_discarded += 1;
            debug!("Discarding batch of {} networks, pipeline inactive", raw.len());
            return None;
        }

        self.stats.batches_ingested += 1;
        if self.in_flight {
            let dropped = self.ingestor.stage(raw);
            self.stats.records_dropped += dropped as u64;
            debug!("Batch of {} networks queued behind in-flight record", raw.len());
            return None;
        }

        let first = self.ingestor.ingest(raw, self.active);
        self.stats.records_dropped += self.ingestor.last_dropped() as u64;
        debug!("Batch of {} networks staged", raw.len());
        first.map(|record| self.send(record))
    }

    /// Transport entry point: the previous message was accepted.
    pub fn on_ack(&mut self) -> Option<Effect> {
        self.stats.acks_received += 1;
        self.in_flight = false;

        if !self.active {
            self.stats.acks_ignored += 1;
            debug!("Ack ignored, pipeline inactive");
            return None;
        }

        if let Some(record) = self.ingestor.take_next() {
            return Some(self.send(record));
        }

        if self.batch_limit_reached() {
            info!(
                "Delivered {} batches, stopping",
                self.stats.batches_ingested
            );
            self.finished = true;
            self.active = false;
            self.phase = DispatchPhase::Idle;
            return Some(Effect::CloseCompanion);
        }

        self.phase = DispatchPhase::DrainedWaitingScan;
        self.stats.scans_requested += 1;
        Some(Effect::RequestScan(ScanReason::Drained))
    }

    fn send(&mut self, record: WireRecord) -> Effect {
        self.in_flight = true;
        self.phase = DispatchPhase::AwaitingAck;
        self.stats.records_sent += 1;
        Effect::Send(record)
    }

    fn batch_limit_reached(&self) -> bool {
        self.max_batches
            .map_or(false, |limit| self.stats.batches_ingested >= limit)
    }

    #[inline]
    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The batch limit was hit; the pipeline will not rescan.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.ingestor.queued()
    }

    #[inline]
    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            phase: self.phase,
            active: self.active,
            in_flight: self.in_flight,
            queued: self.ingestor.queued(),
            alerted_networks: self.ingestor.dedup().len(),
            stats: self.stats.clone(),
        }
    }

    /// Log a delivery summary.
    pub fn log_summary(&self) {
        let s = &self.stats;
        info!("Delivery Summary:");
        info!("  Batches ingested: {}", s.batches_ingested);
        info!("  Records sent: {}", s.records_sent);
        info!("  Records dropped: {}", s.records_dropped);
        info!("  Acks received: {} ({} ignored)", s.acks_received, s.acks_ignored);
        info!("  Scans requested: {}", s.scans_requested);
        info!("  Late batches discarded: {}", s.late_batches_discarded);
        if s.records_dropped > 0 {
            info!("  Drop rate: {:.1}%", s.drop_rate());
        }
    }
}
