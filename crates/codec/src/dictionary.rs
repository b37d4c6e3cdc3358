//! Tagged-field dictionary used as the app-message payload
//!
//! Layout (little endian):
//! - `u8` tuple count
//! - per tuple: `u32` key, `u8` type, `u16` length, `length` value bytes
//!
//! Text values carry their trailing NUL inside `length`. Tuples are
//! written in ascending key order.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// Tuple value type constants
pub mod tuple_type {
    pub const BYTE_ARRAY: u8 = 0;
    pub const CSTRING: u8 = 1;
    pub const UINT: u8 = 2;
    pub const INT: u8 = 3;
}

const DICT_HEADER_LEN: usize = 1;
const TUPLE_HEADER_LEN: usize = 7;

/// One keyed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub key: u32,
    pub kind: u8,
    pub data: Bytes,
}

impl Tuple {
    /// First byte of the value, the way the watch side reads 1-byte ints.
    #[inline]
    #[must_use]
    pub fn as_u8(&self) -> Option<u8> {
        match self.kind {
            tuple_type::INT | tuple_type::UINT => self.data.first().copied(),
            _ => None,
        }
    }

    /// Text value without its trailing NUL.
    pub fn as_str(&self) -> Option<&str> {
        if self.kind != tuple_type::CSTRING {
            return None;
        }
        let raw = match self.data.iter().position(|&b| b == 0) {
            Some(end) => &self.data[..end],
            None => &self.data[..],
        };
        std::str::from_utf8(raw).ok()
    }

    #[inline]
    fn encoded_len(&self) -> usize {
        TUPLE_HEADER_LEN + self.data.len()
    }
}

/// Ordered set of tuples, at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    tuples: Vec<Tuple>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a 1-byte signed integer.
    pub fn add_int8(&mut self, key: u32, value: i8) -> &mut Self {
        self.insert(Tuple {
            key,
            kind: tuple_type::INT,
            data: Bytes::copy_from_slice(&value.to_le_bytes()),
        })
    }

    /// Add a 1-byte unsigned integer.
    pub fn add_uint8(&mut self, key: u32, value: u8) -> &mut Self {
        self.insert(Tuple {
            key,
            kind: tuple_type::UINT,
            data: Bytes::copy_from_slice(&[value]),
        })
    }

    /// Add a NUL-terminated string.
    pub fn add_cstring(&mut self, key: u32, value: &str) -> &mut Self {
        let mut data = BytesMut::with_capacity(value.len() + 1);
        data.put_slice(value.as_bytes());
        data.put_u8(0);
        self.insert(Tuple {
            key,
            kind: tuple_type::CSTRING,
            data: data.freeze(),
        })
    }

    /// Add raw bytes.
    pub fn add_bytes(&mut self, key: u32, value: &[u8]) -> &mut Self {
        self.insert(Tuple {
            key,
            kind: tuple_type::BYTE_ARRAY,
            data: Bytes::copy_from_slice(value),
        })
    }

    fn insert(&mut self, tuple: Tuple) -> &mut Self {
        match self.tuples.binary_search_by_key(&tuple.key, |t| t.key) {
            Ok(idx) => self.tuples[idx] = tuple,
            Err(idx) => self.tuples.insert(idx, tuple),
        }
        self
    }

    pub fn find(&self, key: u32) -> Option<&Tuple> {
        self.tuples
            .binary_search_by_key(&key, |t| t.key)
            .ok()
            .map(|idx| &self.tuples[idx])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }

    /// Exact size of the encoded form.
    pub fn encoded_len(&self) -> usize {
        DICT_HEADER_LEN + self.tuples.iter().map(Tuple::encoded_len).sum::<usize>()
    }

    /// Serialize into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let count = u8::try_from(self.tuples.len())
            .map_err(|_| CodecError::TooManyTuples(self.tuples.len()))?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(count);
        for tuple in &self.tuples {
            let len = u16::try_from(tuple.data.len())
                .map_err(|_| CodecError::ValueTooLarge(tuple.key))?;
            buf.put_u32_le(tuple.key);
            buf.put_u8(tuple.kind);
            buf.put_u16_le(len);
            buf.put_slice(&tuple.data);
        }
        Ok(buf.freeze())
    }

    /// Parse an encoded dictionary. Trailing bytes are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let count = *buf.first().ok_or(CodecError::Truncated {
            needed: DICT_HEADER_LEN,
            available: 0,
        })? as usize;

        let mut dict = Dictionary::new();
        let mut pos = DICT_HEADER_LEN;
        for _ in 0..count {
            let header = buf.get(pos..pos + TUPLE_HEADER_LEN).ok_or(CodecError::Truncated {
                needed: pos + TUPLE_HEADER_LEN,
                available: buf.len(),
            })?;
            let key = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let kind = header[4];
            let len = u16::from_le_bytes([header[5], header[6]]) as usize;
            if kind > tuple_type::INT {
                return Err(CodecError::UnknownTupleType(kind));
            }
            pos += TUPLE_HEADER_LEN;

            let data = buf.get(pos..pos + len).ok_or(CodecError::Truncated {
                needed: pos + len,
                available: buf.len(),
            })?;
            pos += len;

            dict.insert(Tuple {
                key,
                kind,
                data: Bytes::copy_from_slice(data),
            });
        }
        Ok(dict)
    }
}
