use thiserror::Error;

/// Errors from encoding or decoding metric records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The metric name does not fit in the fixed-width name field.
    #[error("record too large: name is {len} bytes (max {max})")]
    RecordTooLarge { len: usize, max: usize },

    /// Not enough bytes to decode.
    #[error("truncated record data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// The kind byte is neither counter nor gauge.
    #[error("unknown metric kind byte: {0:#04x}")]
    UnknownKind(u8),

    /// The name field is not valid UTF-8.
    #[error("metric name is not valid utf-8: {0}")]
    InvalidName(#[from] std::str::Utf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_record_too_large() {
        let err = CodecError::RecordTooLarge { len: 70, max: 64 };
        assert_eq!(err.to_string(), "record too large: name is 70 bytes (max 64)");
    }

    #[test]
    fn test_display_truncated() {
        let err = CodecError::Truncated { need: 80, have: 12 };
        assert!(err.to_string().contains("need 80"));
    }

    #[test]
    fn test_display_unknown_kind() {
        let err = CodecError::UnknownKind(0x7f);
        assert!(err.to_string().contains("0x7f"));
    }
}
