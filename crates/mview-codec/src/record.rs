//! Fixed-offset encode/decode for one metric record.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Width of the null-padded name field in bytes.
pub const NAME_LEN: usize = 64;

/// Byte offset of the kind field within a record.
pub const KIND_OFFSET: usize = 64;

/// Byte offset of the value field within a record. The 7 bytes between the
/// kind and the value are padding to keep the f64 naturally aligned.
pub const VALUE_OFFSET: usize = 72;

/// Total size of one encoded record.
pub const RECORD_SIZE: usize = 80;

/// Kind of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_byte(self) -> u8 {
        match self {
            MetricKind::Counter => 0,
            MetricKind::Gauge => 1,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0 => Ok(MetricKind::Counter),
            1 => Ok(MetricKind::Gauge),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

/// One decoded metric record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
}

/// Encode a metric record into its fixed 80-byte layout.
///
/// Fails with `RecordTooLarge` when the name exceeds the fixed name width.
pub fn encode(name: &str, kind: MetricKind, value: f64) -> Result<[u8; RECORD_SIZE], CodecError> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > NAME_LEN {
        return Err(CodecError::RecordTooLarge {
            len: name_bytes.len(),
            max: NAME_LEN,
        });
    }

    let mut buf = [0u8; RECORD_SIZE];
    buf[..name_bytes.len()].copy_from_slice(name_bytes);
    buf[KIND_OFFSET] = kind.as_byte();
    buf[VALUE_OFFSET..VALUE_OFFSET + 8].copy_from_slice(&value.to_le_bytes());
    Ok(buf)
}

/// Decode one record from the start of `bytes`. Exact inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<MetricRecord, CodecError> {
    if bytes.len() < RECORD_SIZE {
        return Err(CodecError::Truncated {
            need: RECORD_SIZE,
            have: bytes.len(),
        });
    }

    let name_field = &bytes[..NAME_LEN];
    let end = name_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(NAME_LEN);
    let name = std::str::from_utf8(&name_field[..end])?.to_string();

    let kind = MetricKind::from_byte(bytes[KIND_OFFSET])?;

    let value_bytes: [u8; 8] = bytes[VALUE_OFFSET..VALUE_OFFSET + 8]
        .try_into()
        .expect("slice length verified above");
    let value = f64::from_le_bytes(value_bytes);

    Ok(MetricRecord { name, kind, value })
}

/// Absolute byte offset of the value field for the record at `record_index`
/// within a page. Stable for the lifetime of the record; producers use it to
/// update the value in place.
pub fn value_byte_offset(record_index: usize) -> usize {
    record_index * RECORD_SIZE + VALUE_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases = vec![
            ("request_total".to_string(), MetricKind::Counter, 1923.5),
            (String::new(), MetricKind::Gauge, 0.0),
            ("x".repeat(64), MetricKind::Gauge, -1.5e300),
            ("lat_p99_us".to_string(), MetricKind::Gauge, f64::MIN_POSITIVE),
        ];

        for (name, kind, value) in cases {
            let buf = encode(&name, kind, value).unwrap();
            let rec = decode(&buf).unwrap();
            assert_eq!(rec.name, name);
            assert_eq!(rec.kind, kind);
            assert_eq!(rec.value, value);
        }
    }

    #[test]
    fn test_encode_exact_size() {
        let buf = encode("m", MetricKind::Counter, 1.0).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);
        assert_eq!(RECORD_SIZE, 80);
        assert_eq!(VALUE_OFFSET, 72);
    }

    #[test]
    fn test_encode_name_too_long() {
        let name = "n".repeat(65);
        let err = encode(&name, MetricKind::Gauge, 0.0).unwrap_err();
        assert!(matches!(err, CodecError::RecordTooLarge { len: 65, max: 64 }));
    }

    #[test]
    fn test_decode_truncated() {
        let err = decode(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { need: 80, have: 12 }));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut buf = encode("m", MetricKind::Counter, 1.0).unwrap();
        buf[KIND_OFFSET] = 9;
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(9)));
    }

    #[test]
    fn test_value_is_little_endian() {
        let buf = encode("m", MetricKind::Gauge, 2.0).unwrap();
        assert_eq!(&buf[VALUE_OFFSET..VALUE_OFFSET + 8], &2.0f64.to_le_bytes());
    }

    #[test]
    fn test_value_byte_offset_strictly_increasing() {
        let mut prev = None;
        for i in 0..10 {
            let off = value_byte_offset(i);
            assert_eq!(off, i * RECORD_SIZE + VALUE_OFFSET);
            if let Some(p) = prev {
                assert!(off > p);
            }
            prev = Some(off);
        }
    }

    #[test]
    fn test_kind_serde() {
        assert_eq!(serde_json::to_string(&MetricKind::Counter).unwrap(), "\"counter\"");
        let k: MetricKind = serde_json::from_str("\"gauge\"").unwrap();
        assert_eq!(k, MetricKind::Gauge);
    }
}
