//! Detective Codec - compact wire encoding
//!
//! This crate provides:
//! - the tagged-field dictionary each record is sent as
//! - the record <-> dictionary mapping (field keys 0, 2..=6)
//! - the length-prefixed frame format used over TCP

pub mod dictionary;
pub mod error;
pub mod frame;
pub mod record;

pub use dictionary::{tuple_type, Dictionary, Tuple};
pub use error::CodecError;
pub use frame::{read_frame, write_frame, Frame, ACK, MAX_FRAME_PAYLOAD, NACK};
pub use record::{decode_record, encode_record, keys};
