//! Receiver - Far-end consumer of delivered network records
//!
//! Holds the two network lists a wrist display would show and serves the
//! framed TCP protocol the phone side speaks.

mod board;
mod server;

pub use board::{
    signal_bars, BoardEntry, BoardView, NetworkBoard, Section, EMPTY_SECTION_SUBTITLE,
    EMPTY_SECTION_TITLE, MAX_BSSID_BYTES, MAX_SECTION_ENTRIES, MAX_SSID_BYTES,
};
pub use server::{BoardEvent, ReceiverServer};
