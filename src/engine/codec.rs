//! SEDIMENT - Entry Codec
//! Binary framing and parsing of a single key-value record plus its
//! integrity checksum.
//!
//! ## Binary Format (per record)
//! ```text
//! [total_size: 4 bytes (LE)][key_len: 4 bytes (LE)][key: N bytes][value_len: 4 bytes (LE)][value: M bytes][sha1(value): 20 bytes]
//! ```
//! `total_size` covers the whole record including itself:
//! `total_size = 12 + key_len + value_len + 20`.

use std::io::Read;

use bytes::{Buf, BufMut};
use sha1::{Digest, Sha1};

use crate::error::{Result, SedimentError};
use crate::types::Entry;

/// Combined size of the three length fields.
const LEN_FIELDS: usize = 12;

/// Size of the SHA-1 digest trailing every record.
pub const CHECKSUM_LEN: usize = 20;

/// Smallest possible record: empty key, empty value.
const MIN_RECORD_LEN: usize = LEN_FIELDS + CHECKSUM_LEN;

/// Encoded size of a record with the given key and value lengths.
pub fn encoded_len(key_len: usize, value_len: usize) -> usize {
    LEN_FIELDS + key_len + value_len + CHECKSUM_LEN
}

/// Encode an entry into the binary record format.
pub fn encode(entry: &Entry) -> Vec<u8> {
    let total = encoded_len(entry.key.len(), entry.value.len());
    let mut buf = Vec::with_capacity(total);
    buf.put_u32_le(total as u32);
    buf.put_u32_le(entry.key.len() as u32);
    buf.put_slice(&entry.key);
    buf.put_u32_le(entry.value.len() as u32);
    buf.put_slice(&entry.value);
    buf.put_slice(Sha1::digest(&entry.value).as_slice());
    buf
}

/// Decode a complete record from `buf`.
///
/// The `total_size` field must exactly equal the buffer length, the
/// length fields must stay within bounds, and the recomputed value
/// digest must match the stored one. Any violation is reported as
/// [`SedimentError::Corrupted`].
pub fn decode(buf: &[u8]) -> Result<Entry> {
    if buf.len() < MIN_RECORD_LEN {
        return Err(SedimentError::Corrupted(format!(
            "record too short: {} bytes",
            buf.len()
        )));
    }

    let mut cursor = buf;
    let total = cursor.get_u32_le() as usize;
    if total != buf.len() {
        return Err(SedimentError::Corrupted(format!(
            "size field says {} bytes, record has {}",
            total,
            buf.len()
        )));
    }

    let key_len = cursor.get_u32_le() as usize;
    if cursor.remaining() < key_len + 4 {
        return Err(SedimentError::Corrupted(format!(
            "key length {} out of bounds",
            key_len
        )));
    }
    let key = cursor.copy_to_bytes(key_len).to_vec();

    let value_len = cursor.get_u32_le() as usize;
    if cursor.remaining() != value_len + CHECKSUM_LEN {
        return Err(SedimentError::Corrupted(format!(
            "value length {} out of bounds",
            value_len
        )));
    }
    let value = cursor.copy_to_bytes(value_len).to_vec();

    let stored = cursor.copy_to_bytes(CHECKSUM_LEN);
    let computed = Sha1::digest(&value);
    if stored.as_ref() != computed.as_slice() {
        return Err(SedimentError::Corrupted("checksum mismatch".to_string()));
    }

    Ok(Entry { key, value })
}

/// Decode one record from a stream, returning the entry and the number
/// of bytes consumed.
///
/// Returns `Ok(None)` on a clean end-of-data boundary (zero bytes
/// available before the size prefix). A partial record at end-of-stream
/// is reported as [`SedimentError::Truncated`] so callers can tell the
/// two apart.
pub fn decode_from_stream<R: Read>(reader: &mut R) -> Result<Option<(Entry, u64)>> {
    let mut prefix = [0u8; 4];
    if !try_fill(reader, &mut prefix)? {
        return Ok(None);
    }

    let total = u32::from_le_bytes(prefix) as usize;
    if total < MIN_RECORD_LEN {
        return Err(SedimentError::Corrupted(format!(
            "size field too small: {} bytes",
            total
        )));
    }

    let mut buf = vec![0u8; total];
    buf[..4].copy_from_slice(&prefix);
    if !try_fill(reader, &mut buf[4..])? {
        return Err(SedimentError::Truncated);
    }

    let entry = decode(&buf)?;
    Ok(Some((entry, total as u64)))
}

/// Fill `buf` completely from the reader. Returns `Ok(false)` when the
/// stream ends before the first byte, `Err(Truncated)` when it ends
/// mid-buffer.
fn try_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(SedimentError::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Entry {
        Entry::new(b"key".to_vec(), b"test-value".to_vec())
    }

    #[test]
    fn test_roundtrip() {
        let entry = sample();
        let encoded = encode(&entry);
        assert_eq!(encoded.len(), encoded_len(3, 10));

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_roundtrip_empty_key_and_value() {
        let entry = Entry::new(Vec::new(), Vec::new());
        let encoded = encode(&entry);
        assert_eq!(encoded.len(), MIN_RECORD_LEN);
        assert_eq!(decode(&encoded).unwrap(), entry);
    }

    #[test]
    fn test_value_tamper_detected() {
        let entry = sample();
        let mut encoded = encode(&entry);

        // First byte of the value region.
        let value_start = 12 + entry.key.len();
        encoded[value_start] ^= 0xFF;

        match decode(&encoded) {
            Err(SedimentError::Corrupted(_)) => {}
            other => panic!("expected Corrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_tamper_detected() {
        let mut encoded = encode(&sample());
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        match decode(&encoded) {
            Err(SedimentError::Corrupted(_)) => {}
            other => panic!("expected Corrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_size_field_mismatch_detected() {
        let mut encoded = encode(&sample());
        // Claim one byte more than the record holds.
        let total = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        encoded[..4].copy_from_slice(&(total + 1).to_le_bytes());

        match decode(&encoded) {
            Err(SedimentError::Corrupted(_)) => {}
            other => panic!("expected Corrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_key_length_out_of_bounds() {
        let mut encoded = encode(&sample());
        encoded[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

        match decode(&encoded) {
            Err(SedimentError::Corrupted(_)) => {}
            other => panic!("expected Corrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_roundtrip_reports_bytes_consumed() {
        let entry = sample();
        let encoded = encode(&entry);

        let mut reader = Cursor::new(encoded.clone());
        let (decoded, consumed) = decode_from_stream(&mut reader).unwrap().unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, encoded.len() as u64);
    }

    #[test]
    fn test_stream_clean_end_of_data() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        assert!(decode_from_stream(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_stream_sequential_records_then_eof() {
        let a = Entry::new(b"a".to_vec(), b"1".to_vec());
        let b = Entry::new(b"b".to_vec(), b"2".to_vec());
        let mut stream = encode(&a);
        stream.extend_from_slice(&encode(&b));

        let mut reader = Cursor::new(stream);
        assert_eq!(decode_from_stream(&mut reader).unwrap().unwrap().0, a);
        assert_eq!(decode_from_stream(&mut reader).unwrap().unwrap().0, b);
        assert!(decode_from_stream(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_stream_truncated_prefix() {
        let encoded = encode(&sample());
        let mut reader = Cursor::new(encoded[..2].to_vec());

        match decode_from_stream(&mut reader) {
            Err(SedimentError::Truncated) => {}
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_truncated_body() {
        let encoded = encode(&sample());
        let mut reader = Cursor::new(encoded[..encoded.len() - 5].to_vec());

        match decode_from_stream(&mut reader) {
            Err(SedimentError::Truncated) => {}
            other => panic!("expected Truncated, got {:?}", other),
        }
    }
}
