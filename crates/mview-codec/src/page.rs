//! Slicing a raw page buffer back into typed records.

use crate::error::CodecError;
use crate::record::{decode, MetricRecord, RECORD_SIZE};

/// Number of records that fit in a page of the given byte size.
pub fn records_per_page(page_size_bytes: usize) -> usize {
    page_size_bytes / RECORD_SIZE
}

/// Usable byte length of a page: the largest multiple of the record size
/// that fits. Record slots beyond this are never written.
pub fn page_usable_len(page_size_bytes: usize) -> usize {
    records_per_page(page_size_bytes) * RECORD_SIZE
}

/// Decode the first `occupancy` records of a raw page buffer.
///
/// `bytes` is the page as read from the pool; slots past `occupancy` are
/// ignored regardless of content.
pub fn decode_page(bytes: &[u8], occupancy: usize) -> Result<Vec<MetricRecord>, CodecError> {
    let need = occupancy * RECORD_SIZE;
    if bytes.len() < need {
        return Err(CodecError::Truncated {
            need,
            have: bytes.len(),
        });
    }

    let mut records = Vec::with_capacity(occupancy);
    for i in 0..occupancy {
        let start = i * RECORD_SIZE;
        records.push(decode(&bytes[start..start + RECORD_SIZE])?);
    }
    Ok(records)
}
