// crates/receiver/src/board.rs
//! Network board - what the far-end display holds

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use detective_common::WireRecord;

/// Rows kept per section. Records past this are dropped.
pub const MAX_SECTION_ENTRIES: usize = 32;
pub const MAX_SSID_BYTES: usize = 32;
pub const MAX_BSSID_BYTES: usize = 17;

/// Row shown for a section with no networks.
pub const EMPTY_SECTION_TITLE: &str = "Vacuum";
pub const EMPTY_SECTION_SUBTITLE: &str = "No networks detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Public,
    Protected,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Public, Section::Protected];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Public => "Public networks",
            Section::Protected => "Protected networks",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One displayed network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub ssid: String,
    pub bssid: String,
    pub signal_quality: u8,
}

impl BoardEntry {
    #[inline]
    pub fn bars(&self) -> u8 {
        signal_bars(self.signal_quality)
    }
}

/// Signal icon index, 0..=3.
#[inline]
pub fn signal_bars(quality: u8) -> u8 {
    match quality {
        80..=u8::MAX => 3,
        50..=79 => 2,
        20..=49 => 1,
        _ => 0,
    }
}

/// Cut `text` to at most `max` bytes without splitting a character.
fn truncate_bytes(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Serializable copy of the board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub running: bool,
    pub public: Vec<BoardEntry>,
    pub protected: Vec<BoardEntry>,
    pub alerts: u64,
    pub messages: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BoardView {
    pub fn section(&self, section: Section) -> &[BoardEntry] {
        match section {
            Section::Public => &self.public,
            Section::Protected => &self.protected,
        }
    }
}

/// Public and protected network lists, rebuilt on every Cleanup.
#[derive(Debug, Default)]
pub struct NetworkBoard {
    running: bool,
    public: Vec<BoardEntry>,
    protected: Vec<BoardEntry>,
    alerts: u64,
    messages: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl NetworkBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Companion app started; it comes up with empty lists.
    pub fn launch(&mut self) {
        info!("Companion app launched");
        self.running = true;
        self.public.clear();
        self.protected.clear();
    }

    pub fn close(&mut self) {
        info!("Companion app closed");
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Apply one record. Returns the entry when the record asks for an alert.
    pub fn apply(&mut self, record: &WireRecord) -> Option<BoardEntry> {
        self.messages += 1;
        self.updated_at = Some(Utc::now());

        let network = match record {
            WireRecord::Cleanup => {
                self.public.clear();
                self.protected.clear();
                return None;
            }
            WireRecord::Network(network) => network,
        };

        let entry = BoardEntry {
            ssid: truncate_bytes(&network.ssid, MAX_SSID_BYTES),
            bssid: truncate_bytes(&network.bssid, MAX_BSSID_BYTES),
            signal_quality: network.signal_quality,
        };

        let section = if network.is_encrypted {
            Section::Protected
        } else {
            Section::Public
        };
        let rows = match section {
            Section::Public => &mut self.public,
            Section::Protected => &mut self.protected,
        };
        if rows.len() < MAX_SECTION_ENTRIES {
            rows.push(entry.clone());
        } else {
            debug!("{} full, dropping {}", section, entry.ssid);
        }

        if network.should_alert {
            self.alerts += 1;
            Some(entry)
        } else {
            None
        }
    }

    pub fn section(&self, section: Section) -> &[BoardEntry] {
        match section {
            Section::Public => &self.public,
            Section::Protected => &self.protected,
        }
    }

    /// Display rows for a section as (title, subtitle, bars).
    pub fn rows(&self, section: Section) -> Vec<(String, String, Option<u8>)> {
        let entries = self.section(section);
        if entries.is_empty() {
            return vec![(
                EMPTY_SECTION_TITLE.to_string(),
                EMPTY_SECTION_SUBTITLE.to_string(),
                None,
            )];
        }
        entries
            .iter()
            .map(|e| (e.ssid.clone(), e.bssid.clone(), Some(e.bars())))
            .collect()
    }

    #[inline]
    pub fn alerts(&self) -> u64 {
        self.alerts
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.protected.is_empty()
    }

    pub fn view(&self) -> BoardView {
        BoardView {
            running: self.running,
            public: self.public.clone(),
            protected: self.protected.clone(),
            alerts: self.alerts,
            messages: self.messages,
            updated_at: self.updated_at,
        }
    }
}
