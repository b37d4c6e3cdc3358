//! Scan Source - Where raw network lists come from

mod fixture;
mod iw;

pub use fixture::FixtureScanSource;
pub use iw::{parse_iw_output, IwScanSource, DEFAULT_INTERFACE, INTERFACE_ENV};
