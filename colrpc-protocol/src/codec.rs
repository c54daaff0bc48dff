//! Encoder and decoder for framed messages.

use crate::binary::BinaryWriter;
use crate::envelope::{self, ApplicationException};
use crate::error::ProtocolError;
use crate::field::Record;
use crate::frame::Frame;
use crate::service::{Call, Reply};
use crate::wire::ProtocolWrite;
use crate::MAX_FRAME_SIZE;
use bytes::{Bytes, BytesMut};

/// Encodes whole messages into frames, one message per frame.
pub struct Encoder;

impl Encoder {
    /// Encodes a `CALL` for `args` with the given sequence id.
    pub fn encode_call<C: Call>(seq_id: i32, args: &C) -> Result<BytesMut, ProtocolError> {
        let mut w = BinaryWriter::new();
        envelope::write_call(&mut w, C::METHOD, seq_id)?;
        args.encode(&mut w)?;
        w.write_message_end()?;
        Frame::new(w.into_bytes()).encode()
    }

    /// Encodes a `ONEWAY` message for `args`.
    pub fn encode_oneway<C: Call>(seq_id: i32, args: &C) -> Result<BytesMut, ProtocolError> {
        let mut w = BinaryWriter::new();
        envelope::write_oneway(&mut w, C::METHOD, seq_id)?;
        args.encode(&mut w)?;
        w.write_message_end()?;
        Frame::new(w.into_bytes()).encode()
    }

    /// Encodes a `REPLY` carrying `reply`.
    pub fn encode_reply<R: Reply>(
        method: &str,
        seq_id: i32,
        reply: &R,
    ) -> Result<BytesMut, ProtocolError> {
        let mut w = BinaryWriter::new();
        envelope::write_reply(&mut w, method, seq_id)?;
        reply.encode(&mut w)?;
        w.write_message_end()?;
        Frame::new(w.into_bytes()).encode()
    }

    /// Encodes an `EXCEPTION` message.
    pub fn encode_exception(
        method: &str,
        seq_id: i32,
        exception: &ApplicationException,
    ) -> Result<BytesMut, ProtocolError> {
        let mut w = BinaryWriter::new();
        envelope::write_exception(&mut w, method, seq_id, exception)?;
        Frame::new(w.into_bytes()).encode()
    }

    /// Frames an already encoded message.
    pub fn encode_frame(payload: Bytes, max: u32) -> Result<BytesMut, ProtocolError> {
        Frame::new(payload).encode_with_limit(max)
    }
}

/// Accumulates transport bytes and yields complete frame payloads.
pub struct Decoder {
    buffer: BytesMut,
    max_frame_size: u32,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame payload from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        Ok(Frame::decode(&mut self.buffer, self.max_frame_size)?.map(|frame| frame.payload))
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
