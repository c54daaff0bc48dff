//! Protocol error types.

use crate::wire::TType;
use thiserror::Error;

/// Protocol-level errors that can occur during framing, primitive decoding
/// or record decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: u32 },

    #[error("unexpected end of message: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("negative size: {0}")]
    NegativeSize(i32),

    #[error("size {0} does not fit the wire format")]
    SizeLimit(usize),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("bad protocol version: {0:#x}")]
    BadVersion(u32),

    #[error("missing version in message header")]
    MissingVersion,

    #[error("invalid message type: {0}")]
    InvalidMessageType(i8),

    #[error("invalid wire type: {0}")]
    InvalidWireType(u8),

    #[error("maximum skip depth {0} exceeded")]
    DepthLimit(usize),

    #[error("element type mismatch: expected {expected:?}, got {actual:?}")]
    ElementTypeMismatch { expected: TType, actual: TType },

    #[error("missing required field {record}.{field}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("{method} failed: unknown result")]
    MissingResult { method: &'static str },

    #[error("{method} does not declare {exception}")]
    UndeclaredException {
        method: &'static str,
        exception: &'static str,
    },
}

impl ProtocolError {
    /// Returns true if the error came from a short or truncated buffer.
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::UnexpectedEof { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::BadVersion(0x8002_0000);
        let msg = err.to_string();
        assert!(msg.contains("80020000"));

        let err = ProtocolError::UnexpectedEof {
            needed: 10,
            remaining: 3,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.is_eof());

        let err = ProtocolError::InvalidUtf8;
        assert!(err.to_string().contains("UTF-8"));
        assert!(!err.is_eof());

        let err = ProtocolError::MissingField {
            record: "Column",
            field: "name",
        };
        assert_eq!(err.to_string(), "missing required field Column.name");

        let err = ProtocolError::MissingResult { method: "get" };
        assert_eq!(err.to_string(), "get failed: unknown result");

        let err = ProtocolError::ElementTypeMismatch {
            expected: TType::I32,
            actual: TType::String,
        };
        assert!(err.to_string().contains("I32"));
    }
}
