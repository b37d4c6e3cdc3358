//! WireRecord <-> dictionary mapping

use bytes::Bytes;
use detective_common::{NetworkRecord, RecordKind, WireRecord};

use crate::dictionary::{Dictionary, Tuple};
use crate::error::CodecError;
use crate::frame::MAX_FRAME_PAYLOAD;

/// Field keys of a wire record
pub mod keys {
    pub const KIND: u32 = 0;
    pub const IS_ENCRYPTED: u32 = 2;
    pub const SIGNAL_QUALITY: u32 = 3;
    pub const SSID: u32 = 4;
    pub const BSSID: u32 = 5;
    pub const SHOULD_ALERT: u32 = 6;
}

/// Build the dictionary for one record.
pub fn record_to_dictionary(record: &WireRecord) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.add_int8(keys::KIND, record.kind().as_u8() as i8);

    if let WireRecord::Network(n) = record {
        dict.add_int8(keys::IS_ENCRYPTED, n.is_encrypted as i8)
            // quality is 0..=200, so it has to go out as the raw byte
            .add_int8(keys::SIGNAL_QUALITY, n.signal_quality as i8)
            .add_cstring(keys::SSID, &n.ssid)
            .add_cstring(keys::BSSID, &n.bssid)
            .add_int8(keys::SHOULD_ALERT, n.should_alert as i8);
    }
    dict
}

/// Encode one record into a transport message.
///
/// Fails with `FrameTooLarge` when the message would not fit in one frame.
pub fn encode_record(record: &WireRecord) -> Result<Bytes, CodecError> {
    let message = record_to_dictionary(record).encode()?;
    if message.len() > MAX_FRAME_PAYLOAD {
        return Err(CodecError::FrameTooLarge {
            len: message.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }
    Ok(message)
}

/// Decode a transport message back into a record.
pub fn decode_record(buf: &[u8]) -> Result<WireRecord, CodecError> {
    let dict = Dictionary::decode(buf)?;
    record_from_dictionary(&dict)
}

pub fn record_from_dictionary(dict: &Dictionary) -> Result<WireRecord, CodecError> {
    let kind = byte_field(dict, keys::KIND)?;
    match RecordKind::from_u8(kind) {
        Some(RecordKind::Cleanup) => Ok(WireRecord::Cleanup),
        Some(RecordKind::Network) => Ok(WireRecord::Network(NetworkRecord {
            is_encrypted: byte_field(dict, keys::IS_ENCRYPTED)? == 1,
            signal_quality: byte_field(dict, keys::SIGNAL_QUALITY)?,
            ssid: text_field(dict, keys::SSID)?,
            bssid: text_field(dict, keys::BSSID)?,
            should_alert: byte_field(dict, keys::SHOULD_ALERT)? == 1,
        })),
        None => Err(CodecError::UnknownKind(kind)),
    }
}

fn byte_field(dict: &Dictionary, key: u32) -> Result<u8, CodecError> {
    dict.find(key)
        .ok_or(CodecError::MissingField(key))?
        .as_u8()
        .ok_or(CodecError::WrongType { key })
}

fn text_field(dict: &Dictionary, key: u32) -> Result<String, CodecError> {
    let tuple: &Tuple = dict.find(key).ok_or(CodecError::MissingField(key))?;
    tuple
        .as_str()
        .map(str::to_owned)
        .ok_or(CodecError::InvalidText(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cafe() -> WireRecord {
        WireRecord::Network(NetworkRecord {
            is_encrypted: true,
            signal_quality: 80,
            ssid: "Cafe".into(),
            bssid: "aa:bb:cc:dd:ee:ff".into(),
            should_alert: false,
        })
    }

    #[test]
    fn test_cleanup_carries_only_kind() {
        let dict = record_to_dictionary(&WireRecord::Cleanup);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.find(keys::KIND).and_then(Tuple::as_u8), Some(0));

        let bytes = encode_record(&WireRecord::Cleanup).unwrap();
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn test_network_fields_by_key() {
        let dict = record_to_dictionary(&cafe());
        let tags: Vec<u32> = dict.iter().map(|t| t.key).collect();
        assert_eq!(tags, vec![0, 2, 3, 4, 5, 6]);
        assert_eq!(dict.find(keys::KIND).and_then(Tuple::as_u8), Some(1));
        assert_eq!(dict.find(keys::IS_ENCRYPTED).and_then(Tuple::as_u8), Some(1));
        assert_eq!(dict.find(keys::SIGNAL_QUALITY).and_then(Tuple::as_u8), Some(80));
        assert_eq!(dict.find(keys::SSID).and_then(Tuple::as_str), Some("Cafe"));
        assert_eq!(dict.find(keys::SHOULD_ALERT).and_then(Tuple::as_u8), Some(0));
    }

    #[test]
    fn test_high_quality_survives_as_byte() {
        let mut record = cafe();
        if let WireRecord::Network(n) = &mut record {
            n.signal_quality = 200;
        }
        let decoded = decode_record(&encode_record(&record).unwrap()).unwrap();
        assert_eq!(decoded.as_network().map(|n| n.signal_quality), Some(200));
    }

    #[test]
    fn test_decode_network_message() {
        let decoded = decode_record(&encode_record(&cafe()).unwrap()).unwrap();
        assert_eq!(decoded, cafe());
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut record = cafe();
        if let WireRecord::Network(n) = &mut record {
            n.ssid = "x".repeat(MAX_FRAME_PAYLOAD);
        }
        assert!(matches!(
            encode_record(&record),
            Err(CodecError::FrameTooLarge { max: MAX_FRAME_PAYLOAD, .. })
        ));
    }

    #[test]
    fn test_decode_missing_field() {
        let mut dict = Dictionary::new();
        dict.add_int8(keys::KIND, 1).add_int8(keys::IS_ENCRYPTED, 0);
        let bytes = dict.encode().unwrap();
        assert!(matches!(
            decode_record(&bytes),
            Err(CodecError::MissingField(keys::SIGNAL_QUALITY))
        ));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut dict = Dictionary::new();
        dict.add_int8(keys::KIND, 5);
        assert!(matches!(
            decode_record(&dict.encode().unwrap()),
            Err(CodecError::UnknownKind(5))
        ));
    }
}
