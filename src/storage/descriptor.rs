// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Range descriptors and their persisted encoding.
//!
//! Format: `[range_id:i64 BE][start_len:u32 BE][start bytes][end_len:u32 BE][end bytes]`

use super::{Key, StorageError, Value};

/// Identifies a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeId(pub i64);

impl std::fmt::Display for RangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The identity and key bounds `[start_key, end_key)` of one range.
///
/// Descriptors are replaced wholesale on split and merge; they are never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeDescriptor {
    pub range_id: RangeId,
    pub start_key: Key,
    pub end_key: Key,
}

impl RangeDescriptor {
    /// Creates a descriptor for `[start_key, end_key)`.
    pub fn new(range_id: RangeId, start_key: impl Into<Key>, end_key: impl Into<Key>) -> Self {
        Self {
            range_id,
            start_key: start_key.into(),
            end_key: end_key.into(),
        }
    }

    /// Returns true if `key` falls within this range.
    #[inline]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.start_key.as_bytes() <= key && key < self.end_key.as_bytes()
    }

    /// Encodes the descriptor as a storable value.
    pub fn encode(&self) -> Value {
        let start = self.start_key.as_bytes();
        let end = self.end_key.as_bytes();
        let mut encoded = Vec::with_capacity(8 + 4 + start.len() + 4 + end.len());

        encoded.extend_from_slice(&self.range_id.0.to_be_bytes());
        encoded.extend_from_slice(&(start.len() as u32).to_be_bytes());
        encoded.extend_from_slice(start);
        encoded.extend_from_slice(&(end.len() as u32).to_be_bytes());
        encoded.extend_from_slice(end);

        Value::new(encoded)
    }

    /// Decodes a descriptor written by [`RangeDescriptor::encode`].
    pub fn decode(encoded: &[u8]) -> Result<Self, StorageError> {
        let mut reader = Reader { buf: encoded };

        let range_id = i64::from_be_bytes(reader.take_array::<8>("range id")?);
        let start_key = reader.take_key("start key")?;
        let end_key = reader.take_key("end key")?;

        if !reader.buf.is_empty() {
            return Err(StorageError::InvalidEncoding(format!(
                "{} trailing bytes after range descriptor",
                reader.buf.len()
            )));
        }

        Ok(Self {
            range_id: RangeId(range_id),
            start_key,
            end_key,
        })
    }
}

impl std::fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:[{}, {})", self.range_id, self.start_key, self.end_key)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], StorageError> {
        if self.buf.len() < n {
            return Err(StorageError::InvalidEncoding(format!(
                "range descriptor truncated reading {what}: need {n} bytes, have {}",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], StorageError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn take_key(&mut self, what: &str) -> Result<Key, StorageError> {
        let len = u32::from_be_bytes(self.take_array::<4>(what)?) as usize;
        Ok(Key::new(self.take(len, what)?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KEY_MAX;

    #[test]
    fn test_encode_decode_roundtrip() {
        let desc = RangeDescriptor::new(RangeId(7), "a", KEY_MAX);
        let decoded = RangeDescriptor::decode(desc.encode().as_bytes()).unwrap();
        assert_eq!(decoded, desc);
    }

    #[test]
    fn test_encoding_layout() {
        let desc = RangeDescriptor::new(RangeId(1), "a", "bc");
        let encoded = desc.encode();
        assert_eq!(
            encoded.as_bytes(),
            &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, b'a', 0, 0, 0, 2, b'b', b'c']
        );
    }

    #[test]
    fn test_decode_truncated() {
        let desc = RangeDescriptor::new(RangeId(1), "a", "bc");
        let encoded = desc.encode();
        let result = RangeDescriptor::decode(&encoded.as_bytes()[..encoded.len() - 1]);
        assert!(matches!(result, Err(StorageError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = RangeDescriptor::new(RangeId(1), "a", "b").encode().0;
        bytes.push(0);
        assert!(RangeDescriptor::decode(&bytes).is_err());
    }

    #[test]
    fn test_contains_key() {
        let desc = RangeDescriptor::new(RangeId(1), "b", "d");
        assert!(!desc.contains_key(b"a"));
        assert!(desc.contains_key(b"b"));
        assert!(desc.contains_key(b"c"));
        assert!(!desc.contains_key(b"d"));
    }
}
