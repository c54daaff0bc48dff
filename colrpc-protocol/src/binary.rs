//! Binary protocol.
//!
//! Big-endian two's complement integers, one-byte booleans, IEEE-754 doubles,
//! `i32`-length-prefixed binaries, typed container headers and a `STOP` byte
//! closing every struct. Struct and field names are not transmitted.

use crate::envelope::{MessageHeader, MessageType};
use crate::error::ProtocolError;
use crate::wire::{FieldHeader, ListHeader, MapHeader, ProtocolRead, ProtocolWrite, TType};
use crate::{VERSION_1, VERSION_MASK};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Reads binary protocol values from a frame payload.
#[derive(Debug, Clone)]
pub struct BinaryReader {
    buf: Bytes,
    strict_read: bool,
}

impl BinaryReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            strict_read: false,
        }
    }

    /// Rejects message headers without a version word.
    pub fn with_strict_read(mut self, strict_read: bool) -> Self {
        self.strict_read = strict_read;
        self
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_size(&mut self) -> Result<usize, ProtocolError> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(ProtocolError::NegativeSize(size));
        }
        Ok(size as usize)
    }

    fn read_ttype(&mut self) -> Result<TType, ProtocolError> {
        self.ensure(1)?;
        TType::from_u8(self.buf.get_u8())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }
}

impl ProtocolRead for BinaryReader {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        let size = self.read_i32()?;
        if size < 0 {
            let version = size as u32 & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProtocolError::BadVersion(version));
            }
            let message_type = MessageType::from_i8((size & 0xff) as i8)?;
            let name = self.read_string()?;
            let seq_id = self.read_i32()?;
            Ok(MessageHeader {
                name,
                message_type,
                seq_id,
            })
        } else {
            if self.strict_read {
                return Err(ProtocolError::MissingVersion);
            }
            let raw = self.read_bytes(size as usize)?;
            let name = String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
            let message_type = MessageType::from_i8(self.read_byte()?)?;
            let seq_id = self.read_i32()?;
            Ok(MessageHeader {
                name,
                message_type,
                seq_id,
            })
        }
    }

    fn read_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError> {
        let ttype = self.read_ttype()?;
        if ttype == TType::Stop {
            return Ok(FieldHeader::stop());
        }
        let id = self.read_i16()?;
        Ok(FieldHeader {
            name: None,
            ttype,
            id,
        })
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        let elem = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(ListHeader { elem, size })
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        self.read_list_begin()
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError> {
        let key = self.read_ttype()?;
        let value = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(MapHeader { key, value, size })
    }

    fn read_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_byte()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn read_binary(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.read_size()?;
        self.read_bytes(len)
    }
}

/// Writes binary protocol values into a growable buffer.
#[derive(Debug)]
pub struct BinaryWriter {
    buf: BytesMut,
    strict_write: bool,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            strict_write: true,
        }
    }

    /// Emits the legacy unversioned message header when disabled.
    pub fn with_strict_write(mut self, strict_write: bool) -> Self {
        self.strict_write = strict_write;
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn write_size(&mut self, size: usize) -> Result<(), ProtocolError> {
        let size = i32::try_from(size).map_err(|_| ProtocolError::SizeLimit(size))?;
        self.buf.put_i32(size);
        Ok(())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWrite for BinaryWriter {
    fn write_message_begin(
        &mut self,
        name: &str,
        message_type: MessageType,
        seq_id: i32,
    ) -> Result<(), ProtocolError> {
        if self.strict_write {
            self.buf.put_u32(VERSION_1 | message_type.as_i8() as u32);
            self.write_string(name)?;
        } else {
            self.write_string(name)?;
            self.buf.put_i8(message_type.as_i8());
        }
        self.buf.put_i32(seq_id);
        Ok(())
    }

    fn write_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_begin(
        &mut self,
        _name: &str,
        ttype: TType,
        id: i16,
    ) -> Result<(), ProtocolError> {
        self.buf.put_u8(ttype.to_u8());
        self.buf.put_i16(id);
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.buf.put_u8(TType::Stop.to_u8());
        Ok(())
    }

    fn write_list_begin(&mut self, elem: TType, size: usize) -> Result<(), ProtocolError> {
        self.buf.put_u8(elem.to_u8());
        self.write_size(size)
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_set_begin(&mut self, elem: TType, size: usize) -> Result<(), ProtocolError> {
        self.write_list_begin(elem, size)
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_map_begin(
        &mut self,
        key: TType,
        value: TType,
        size: usize,
    ) -> Result<(), ProtocolError> {
        self.buf.put_u8(key.to_u8());
        self.buf.put_u8(value.to_u8());
        self.write_size(size)
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.buf.put_u8(value as u8);
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.buf.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.buf.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.buf.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.buf.put_f64(value);
        Ok(())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        self.write_size(value.len())?;
        self.buf.put_slice(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(writer: BinaryWriter) -> BinaryReader {
        BinaryReader::new(writer.into_bytes())
    }

    #[test]
    fn test_primitive_roundtrip() {
        let mut w = BinaryWriter::new();
        w.write_bool(true).unwrap();
        w.write_byte(-3).unwrap();
        w.write_i16(-300).unwrap();
        w.write_i32(70_000).unwrap();
        w.write_i64(-1_000_000_000_000).unwrap();
        w.write_double(2.5).unwrap();
        w.write_binary(&[0xde, 0xad]).unwrap();
        w.write_string("kéy").unwrap();

        let mut r = reader(w);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_byte().unwrap(), -3);
        assert_eq!(r.read_i16().unwrap(), -300);
        assert_eq!(r.read_i32().unwrap(), 70_000);
        assert_eq!(r.read_i64().unwrap(), -1_000_000_000_000);
        assert_eq!(r.read_double().unwrap(), 2.5);
        assert_eq!(r.read_binary().unwrap().as_ref(), &[0xde, 0xad]);
        assert_eq!(r.read_string().unwrap(), "kéy");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut w = BinaryWriter::new();
        w.write_i32(1).unwrap();
        w.write_i16(-2).unwrap();
        assert_eq!(w.as_bytes(), &[0, 0, 0, 1, 0xff, 0xfe]);
    }

    #[test]
    fn test_strict_message_header() {
        let mut w = BinaryWriter::new();
        w.write_message_begin("get", MessageType::Call, 7).unwrap();
        assert_eq!(
            w.as_bytes(),
            &[0x80, 0x01, 0x00, 0x01, 0, 0, 0, 3, b'g', b'e', b't', 0, 0, 0, 7]
        );

        let header = reader(w).read_message_begin().unwrap();
        assert_eq!(header.name, "get");
        assert_eq!(header.message_type, MessageType::Call);
        assert_eq!(header.seq_id, 7);
    }

    #[test]
    fn test_legacy_message_header() {
        let mut w = BinaryWriter::new().with_strict_write(false);
        w.write_message_begin("insert", MessageType::Reply, 42).unwrap();

        let header = reader(w).read_message_begin().unwrap();
        assert_eq!(header.name, "insert");
        assert_eq!(header.message_type, MessageType::Reply);
        assert_eq!(header.seq_id, 42);
    }

    #[test]
    fn test_strict_read_rejects_legacy_header() {
        let mut w = BinaryWriter::new().with_strict_write(false);
        w.write_message_begin("insert", MessageType::Call, 1).unwrap();

        let mut r = BinaryReader::new(w.into_bytes()).with_strict_read(true);
        assert!(matches!(
            r.read_message_begin(),
            Err(ProtocolError::MissingVersion)
        ));
    }

    #[test]
    fn test_bad_version() {
        let mut r = BinaryReader::new(&b"\x80\x02\x00\x01\x00\x00\x00\x00\x00\x00\x00\x01"[..]);
        assert!(matches!(
            r.read_message_begin(),
            Err(ProtocolError::BadVersion(0x8002_0000))
        ));
    }

    #[test]
    fn test_invalid_message_type() {
        let mut r = BinaryReader::new(&b"\x80\x01\x00\x09\x00\x00\x00\x00\x00\x00\x00\x01"[..]);
        assert!(matches!(
            r.read_message_begin(),
            Err(ProtocolError::InvalidMessageType(9))
        ));
    }

    #[test]
    fn test_negative_size() {
        let mut r = BinaryReader::new(&b"\xff\xff\xff\xfe"[..]);
        assert!(matches!(
            r.read_binary(),
            Err(ProtocolError::NegativeSize(-2))
        ));
    }

    #[test]
    fn test_binary_longer_than_frame() {
        let mut r = BinaryReader::new(&b"\x00\x00\x00\x10abc"[..]);
        assert!(matches!(
            r.read_binary(),
            Err(ProtocolError::UnexpectedEof {
                needed: 16,
                remaining: 3
            })
        ));
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut r = BinaryReader::new(&b"\x00\x00\x00\x02\xc3\x28"[..]);
        assert!(matches!(r.read_string(), Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_skip_nested_struct() {
        let mut w = BinaryWriter::new();
        // struct { 1: list<i32> [1, 2], 2: struct { 1: map<string, i64> {"a": 9} } }
        w.write_field_begin("", TType::List, 1).unwrap();
        w.write_list_begin(TType::I32, 2).unwrap();
        w.write_i32(1).unwrap();
        w.write_i32(2).unwrap();
        w.write_field_begin("", TType::Struct, 2).unwrap();
        w.write_field_begin("", TType::Map, 1).unwrap();
        w.write_map_begin(TType::String, TType::I64, 1).unwrap();
        w.write_string("a").unwrap();
        w.write_i64(9).unwrap();
        w.write_field_stop().unwrap();
        w.write_field_stop().unwrap();
        w.write_i32(0x5eed).unwrap();

        let mut r = reader(w);
        r.skip(TType::Struct).unwrap();
        assert_eq!(r.read_i32().unwrap(), 0x5eed);
    }

    #[test]
    fn test_skip_depth_limit() {
        let mut w = BinaryWriter::new();
        for _ in 0..crate::MAX_SKIP_DEPTH + 1 {
            w.write_field_begin("", TType::Struct, 1).unwrap();
        }

        let mut r = reader(w);
        assert!(matches!(
            r.skip(TType::Struct),
            Err(ProtocolError::DepthLimit(_))
        ));
    }

    #[test]
    fn test_skip_rejects_void_elements() {
        let mut w = BinaryWriter::new();
        w.write_list_begin(TType::Void, i32::MAX as usize).unwrap();

        let mut r = reader(w);
        assert!(matches!(
            r.skip(TType::List),
            Err(ProtocolError::InvalidWireType(1))
        ));
    }
}
