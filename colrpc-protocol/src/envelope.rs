//! Message envelopes: call, reply, exception and oneway headers, plus the
//! application exception carried by `EXCEPTION` messages.

use crate::error::ProtocolError;
use crate::field::Record;
use crate::wire::{ProtocolRead, ProtocolWrite};
use std::fmt;

/// Envelope message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    pub fn as_i8(self) -> i8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }

    pub fn from_i8(value: i8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Call => write!(f, "CALL"),
            MessageType::Reply => write!(f, "REPLY"),
            MessageType::Exception => write!(f, "EXCEPTION"),
            MessageType::Oneway => write!(f, "ONEWAY"),
        }
    }
}

/// Decoded message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: MessageType,
    pub seq_id: i32,
}

wire_enum! {
    /// Category of an application exception.
    pub enum ApplicationExceptionKind {
        UNKNOWN = 0,
        UNKNOWN_METHOD = 1,
        INVALID_MESSAGE_TYPE = 2,
        WRONG_METHOD_NAME = 3,
        BAD_SEQUENCE_ID = 4,
        MISSING_RESULT = 5,
        INTERNAL_ERROR = 6,
        PROTOCOL_ERROR = 7,
        INVALID_TRANSFORM = 8,
        INVALID_PROTOCOL = 9,
        UNSUPPORTED_CLIENT_TYPE = 10,
    }
}

wire_struct! {
    /// Protocol-level failure reported in place of a reply.
    pub struct ApplicationException {
        1: optional message: String,
        2: optional kind: ApplicationExceptionKind,
    }
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            kind: Some(kind),
        }
    }

    pub fn kind(&self) -> ApplicationExceptionKind {
        self.kind.unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "application exception: {}", self.kind())
        } else {
            write!(f, "application exception ({}): {}", self.kind(), self.message())
        }
    }
}

impl std::error::Error for ApplicationException {}

pub fn write_call<W: ProtocolWrite>(w: &mut W, name: &str, seq_id: i32) -> Result<(), ProtocolError> {
    w.write_message_begin(name, MessageType::Call, seq_id)
}

pub fn write_reply<W: ProtocolWrite>(w: &mut W, name: &str, seq_id: i32) -> Result<(), ProtocolError> {
    w.write_message_begin(name, MessageType::Reply, seq_id)
}

pub fn write_oneway<W: ProtocolWrite>(
    w: &mut W,
    name: &str,
    seq_id: i32,
) -> Result<(), ProtocolError> {
    w.write_message_begin(name, MessageType::Oneway, seq_id)
}

/// Writes a complete `EXCEPTION` message.
pub fn write_exception<W: ProtocolWrite>(
    w: &mut W,
    name: &str,
    seq_id: i32,
    exception: &ApplicationException,
) -> Result<(), ProtocolError> {
    w.write_message_begin(name, MessageType::Exception, seq_id)?;
    exception.encode(w)?;
    w.write_message_end()
}

/// Reads a message header. For `EXCEPTION` messages the body is an
/// [`ApplicationException`].
pub fn read_message<R: ProtocolRead>(r: &mut R) -> Result<MessageHeader, ProtocolError> {
    r.read_message_begin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryReader, BinaryWriter};

    #[test]
    fn test_message_type_codes() {
        for ty in [
            MessageType::Call,
            MessageType::Reply,
            MessageType::Exception,
            MessageType::Oneway,
        ] {
            assert_eq!(MessageType::from_i8(ty.as_i8()).unwrap(), ty);
        }
        assert!(matches!(
            MessageType::from_i8(0),
            Err(ProtocolError::InvalidMessageType(0))
        ));
    }

    #[test]
    fn test_exception_roundtrip() {
        let exc = ApplicationException::new(
            ApplicationExceptionKind::UNKNOWN_METHOD,
            "Unknown function frobnicate",
        );

        let mut w = BinaryWriter::new();
        write_exception(&mut w, "frobnicate", 5, &exc).unwrap();

        let mut r = BinaryReader::new(w.into_bytes());
        let header = read_message(&mut r).unwrap();
        assert_eq!(header.name, "frobnicate");
        assert_eq!(header.message_type, MessageType::Exception);
        assert_eq!(header.seq_id, 5);

        let decoded = ApplicationException::decode(&mut r).unwrap();
        r.read_message_end().unwrap();
        assert_eq!(decoded, exc);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_exception_unknown_kind_preserved() {
        let exc = ApplicationException::new(ApplicationExceptionKind(42), "future");

        let mut w = BinaryWriter::new();
        exc.encode(&mut w).unwrap();
        let decoded = ApplicationException::decode(&mut BinaryReader::new(w.into_bytes())).unwrap();

        assert_eq!(decoded.kind(), ApplicationExceptionKind(42));
        assert_eq!(decoded.kind().name(), None);
        assert_eq!(decoded.kind().to_string(), "42");
    }

    #[test]
    fn test_exception_defaults() {
        let exc = ApplicationException::default();
        assert_eq!(exc.kind(), ApplicationExceptionKind::UNKNOWN);
        assert_eq!(exc.message(), "");
        assert_eq!(exc.to_string(), "application exception: UNKNOWN");
    }

    #[test]
    fn test_exception_display() {
        let exc = ApplicationException::new(
            ApplicationExceptionKind::BAD_SEQUENCE_ID,
            "get failed: out of sequence response",
        );
        assert_eq!(
            exc.to_string(),
            "application exception (BAD_SEQUENCE_ID): get failed: out of sequence response"
        );
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(
            ApplicationExceptionKind::from_name("internal_error"),
            Some(ApplicationExceptionKind::INTERNAL_ERROR)
        );
        assert_eq!(ApplicationExceptionKind::VALUES.len(), 11);
    }
}
