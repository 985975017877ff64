//! Binary layout for metric records and pages.
//!
//! A record is a fixed 80-byte structure shared bit-exactly between the
//! producer writing into the shared pool and the remote collector decoding
//! raw read results:
//!
//! ```text
//! [name: 64 bytes, null-padded UTF-8][kind: u8][pad: 7 bytes][value: f64 LE]
//! ```
//!
//! The value field sits at a fixed offset so a producer can update it in
//! place without re-encoding the whole record.

pub mod error;
pub mod page;
pub mod record;

pub use error::CodecError;
pub use page::{decode_page, page_usable_len, records_per_page};
pub use record::{
    decode, encode, value_byte_offset, MetricKind, MetricRecord, NAME_LEN, RECORD_SIZE,
    VALUE_OFFSET,
};
