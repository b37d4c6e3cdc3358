//! Core data types for the wifi-detective delivery pipeline
//!
//! Records flow in one direction:
//! - `RawNetwork` comes out of a scan source
//! - `WireRecord` is what the pipeline queues and hands to the transport
//!
//! `WireRecord` is an enum rather than a bag of optional fields so that a
//! Cleanup record can never carry network data and a Network record always
//! carries all of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Far-end companion application launched when the pipeline is activated.
pub const DEFAULT_COMPANION_APP: Uuid = Uuid::from_u128(0x2db008d5_535c_4daf_a92a_0a30b32080cd);

/// Default delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// One access point as reported by a scan source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNetwork {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub bssid: String,
    /// Free-form security description, e.g. `[WPA2-PSK-CCMP][ESS]`.
    #[serde(default)]
    pub capabilities: Option<String>,
    /// Signal level in dBm (negative). Missing means a weak signal.
    #[serde(alias = "signal_level", default = "weak_signal")]
    pub level: i32,
}

/// Level assumed when a source reports none.
pub const WEAK_SIGNAL_DBM: i32 = -100;

fn weak_signal() -> i32 {
    WEAK_SIGNAL_DBM
}

impl RawNetwork {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>, B: Into<String>>(ssid: S, bssid: B, level: i32) -> Self {
        Self {
            ssid: ssid.into(),
            bssid: bssid.into(),
            capabilities: None,
            level,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_capabilities<C: Into<String>>(mut self, capabilities: C) -> Self {
        self.capabilities = Some(capabilities.into());
        self
    }
}

/// Purpose tag carried by every wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Cleanup,
    Network,
}

impl RecordKind {
    #[inline]
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            RecordKind::Cleanup => 0,
            RecordKind::Network => 1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordKind::Cleanup),
            1 => Some(RecordKind::Network),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Cleanup => "cleanup",
            RecordKind::Network => "network",
        };
        f.write_str(s)
    }
}

/// Payload of a Network record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub is_encrypted: bool,
    pub signal_quality: u8,
    pub ssid: String,
    pub bssid: String,
    pub should_alert: bool,
}

/// One unit handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireRecord {
    /// Tells the far end to drop whatever it shows from the previous batch.
    Cleanup,
    Network(NetworkRecord),
}

impl WireRecord {
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            WireRecord::Cleanup => RecordKind::Cleanup,
            WireRecord::Network(_) => RecordKind::Network,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_cleanup(&self) -> bool {
        matches!(self, WireRecord::Cleanup)
    }

    #[inline]
    #[must_use]
    pub fn as_network(&self) -> Option<&NetworkRecord> {
        match self {
            WireRecord::Network(n) => Some(n),
            WireRecord::Cleanup => None,
        }
    }
}

impl fmt::Display for WireRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireRecord::Cleanup => f.write_str("cleanup"),
            WireRecord::Network(n) => write!(
                f,
                "network {} ({}) q={} enc={} alert={}",
                n.ssid, n.bssid, n.signal_quality, n.is_encrypted, n.should_alert
            ),
        }
    }
}

/// Pipeline tuning options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub queue_capacity: usize,
    pub companion_app: Uuid,
    /// Pause before each scan that follows a drained queue.
    pub rescan_interval: Duration,
    /// Stop after this many batches have been delivered.
    pub max_batches: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            companion_app: DEFAULT_COMPANION_APP,
            rescan_interval: Duration::ZERO,
            max_batches: None,
        }
    }
}

impl PipelineOptions {
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_companion_app(mut self, app: Uuid) -> Self {
        self.companion_app = app;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_batches(mut self, batches: u64) -> Self {
        self.max_batches = Some(batches);
        self
    }
}

/// Delivery counters collected by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub batches_ingested: u64,
    pub records_sent: u64,
    pub records_dropped: u64,
    pub acks_received: u64,
    pub acks_ignored: u64,
    pub scans_requested: u64,
    pub late_batches_discarded: u64,
}

impl DeliveryStats {
    /// Share of queued records that were dropped by overflow, in [0.0, 100.0].
    #[must_use]
    pub fn drop_rate(&self) -> f64 {
        let total = self.records_sent + self.records_dropped;
        if total == 0 {
            0.0
        } else {
            (self.records_dropped as f64 / total as f64) * 100.0
        }
    }
}
