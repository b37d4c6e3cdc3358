//! Raw scan record -> Network wire record

use detective_common::{NetworkRecord, RawNetwork, WireRecord};

use crate::dedup::DedupTracker;

/// Capability substrings that mark a network as protected.
pub const ENCRYPTION_MARKERS: [&str; 3] = ["WEP", "PSK", "EAP"];

/// Highest signal quality that fits the wire byte.
pub const MAX_SIGNAL_QUALITY: i32 = 200;

/// Substring heuristic over the capabilities text, not a protocol parse.
#[inline]
pub fn is_encrypted(capabilities: Option<&str>) -> bool {
    match capabilities {
        Some(caps) => ENCRYPTION_MARKERS.iter().any(|marker| caps.contains(marker)),
        None => false,
    }
}

/// `2 * (level + 100)`, clamped to `0..=200`.
///
/// Matches the unclamped transform for every level in -100..=0.
#[inline]
pub fn signal_quality(level: i32) -> u8 {
    level
        .saturating_add(100)
        .saturating_mul(2)
        .clamp(0, MAX_SIGNAL_QUALITY) as u8
}

/// Encode one raw record, consulting and updating `dedup`.
///
/// Not pure: an unencrypted network whose SSID has not alerted yet is
/// recorded in `dedup`, so call order decides which duplicate alerts.
pub fn encode_network(raw: &RawNetwork, dedup: &mut DedupTracker) -> WireRecord {
    let encrypted = is_encrypted(raw.capabilities.as_deref());

    let should_alert = !encrypted && !dedup.seen(&raw.ssid);
    if should_alert {
        dedup.mark_seen(&raw.ssid);
    }

    WireRecord::Network(NetworkRecord {
        is_encrypted: encrypted,
        signal_quality: signal_quality(raw.level),
        ssid: raw.ssid.clone(),
        bssid: raw.bssid.clone(),
        should_alert,
    })
}
