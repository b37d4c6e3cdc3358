//! Replays recorded scan batches from JSON

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use detective_common::{RawNetwork, ScanSource};

/// Accepted file shapes: a list of batches, or a single batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Batches(Vec<Vec<RawNetwork>>),
    Single(Vec<RawNetwork>),
}

/// Scan source that returns pre-recorded batches in order, wrapping around
/// after the last one.
#[derive(Debug)]
pub struct FixtureScanSource {
    batches: Vec<Vec<RawNetwork>>,
    next: AtomicUsize,
}

impl FixtureScanSource {
    pub fn from_batches(batches: Vec<Vec<RawNetwork>>) -> Self {
        Self {
            batches,
            next: AtomicUsize::new(0),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: FixtureFile =
            serde_json::from_str(text).context("Invalid scan fixture JSON")?;
        let batches = match file {
            FixtureFile::Batches(batches) => batches,
            FixtureFile::Single(batch) => vec![batch],
        };
        Ok(Self::from_batches(batches))
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read scan fixture {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[async_trait]
impl ScanSource for FixtureScanSource {
    async fn scan(&self) -> Result<Vec<RawNetwork>> {
        if self.batches.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.batches.len();
        debug!("Replaying fixture batch {}", index);
        Ok(self.batches[index].clone())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCHES: &str = r#"[
        [
            {"ssid": "Cafe", "bssid": "aa:aa:aa:aa:aa:aa", "capabilities": "[WPA2-PSK]", "level": -60},
            {"ssid": "Open", "bssid": "bb:bb:bb:bb:bb:bb", "capabilities": "[ESS]", "level": -80}
        ],
        [
            {"ssid": "Hotel", "signal_level": -70}
        ]
    ]"#;

    #[tokio::test]
    async fn replays_batches_in_order_and_wraps() {
        let source = FixtureScanSource::from_json(BATCHES).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.scan().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].capabilities.as_deref(), Some("[WPA2-PSK]"));

        let second = source.scan().await.unwrap();
        assert_eq!(second[0].ssid, "Hotel");
        assert_eq!(second[0].level, -70);
        assert_eq!(second[0].capabilities, None);

        let third = source.scan().await.unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn single_batch_file() {
        let source =
            FixtureScanSource::from_json(r#"[{"ssid": "Solo", "level": -50}]"#).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(source.scan().await.unwrap()[0].ssid, "Solo");
    }

    #[tokio::test]
    async fn empty_fixture_scans_nothing() {
        let source = FixtureScanSource::from_batches(Vec::new());
        assert!(source.is_empty());
        assert!(source.scan().await.unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(FixtureScanSource::from_json("{not json").is_err());
        assert!(FixtureScanSource::from_json(r#"[{"ssid": "NoLevel"}]"#).is_err());
    }

    #[tokio::test]
    async fn from_path_reports_missing_file() {
        let err = FixtureScanSource::from_path("/nonexistent/fixture.json")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read scan fixture"));
    }
}
