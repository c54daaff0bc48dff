//! Length-prefixed frame format.
//!
//! Every message travels in exactly one frame:
//!
//! ```text
//! +----------------+------------------------------+
//! | payload_len    | payload                      |
//! | u32 big-endian | binary protocol message      |
//! +----------------+------------------------------+
//! ```

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// A single framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Binary protocol payload.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encodes the frame into bytes, rejecting payloads over `MAX_FRAME_SIZE`.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        self.encode_with_limit(MAX_FRAME_SIZE)
    }

    /// Encodes the frame into bytes with an explicit payload limit.
    pub fn encode_with_limit(&self, max: u32) -> Result<BytesMut, ProtocolError> {
        let len = self.payload.len();
        if len > max as usize {
            return Err(ProtocolError::FrameTooLarge { size: len, max });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + len);
        buf.put_u32(len as u32);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` if the announced length
    /// exceeds `max`.
    pub fn decode(buf: &mut BytesMut, max: u32) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if len > max {
            return Err(ProtocolError::FrameTooLarge {
                size: len as usize,
                max,
            });
        }

        let total_len = FRAME_HEADER_SIZE + len as usize;
        if buf.len() < total_len {
            buf.reserve(total_len - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(len as usize).freeze();
        Ok(Some(Self { payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(&b"\x80\x01\x00\x01payload"[..]);

        let mut buf = frame.encode().unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 11]);

        let decoded = Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        assert!(Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_incomplete_payload() {
        let mut buf = BytesMut::from(&b"\x00\x00\x00\x05abc"[..]);
        assert!(Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().is_none());

        buf.extend_from_slice(b"de");
        let decoded = Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(decoded.payload.as_ref(), b"abcde");
    }

    #[test]
    fn test_frame_too_large_on_decode() {
        let mut buf = BytesMut::from(&b"\x00\x00\x01\x00"[..]);
        let result = Frame::decode(&mut buf, 16);
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { size: 256, max: 16 })
        ));
    }

    #[test]
    fn test_frame_too_large_on_encode() {
        let frame = Frame::new(vec![0u8; 32]);
        let result = frame.encode_with_limit(31);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(Bytes::new());
        let mut buf = frame.encode().unwrap();
        assert_eq!(buf.len(), FRAME_HEADER_SIZE);

        let decoded = Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(&b"one"[..]).encode().unwrap());
        buf.extend_from_slice(&Frame::new(&b"two"[..]).encode().unwrap());

        let first = Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"one");

        let second = Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(second.payload.as_ref(), b"two");

        assert!(Frame::decode(&mut buf, MAX_FRAME_SIZE).unwrap().is_none());
    }
}
