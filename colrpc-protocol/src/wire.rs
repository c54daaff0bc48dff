//! Protocol-independent reader and writer traits.
//!
//! Records and envelopes are written against [`ProtocolRead`] and
//! [`ProtocolWrite`]; [`crate::binary`] provides the binary implementation.

use crate::envelope::{MessageHeader, MessageType};
use crate::error::ProtocolError;
use crate::MAX_SKIP_DEPTH;
use bytes::Bytes;

/// Wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TType {
    Stop,
    Void,
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
    /// Placeholder type emitted by protocols that do not carry field types.
    Generic,
}

impl TType {
    pub fn to_u8(self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Void => 1,
            TType::Bool => 2,
            TType::Byte => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::String => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
            TType::Generic => 127,
        }
    }

    pub fn from_u8(code: u8) -> Result<Self, ProtocolError> {
        Ok(match code {
            0 => TType::Stop,
            1 => TType::Void,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            127 => TType::Generic,
            other => return Err(ProtocolError::InvalidWireType(other)),
        })
    }

    /// Returns true for types that can appear as a value.
    pub fn is_value(self) -> bool {
        !matches!(self, TType::Stop | TType::Void | TType::Generic)
    }
}

/// Header of a struct field as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHeader {
    /// Field name, for protocols that carry one.
    pub name: Option<String>,
    pub ttype: TType,
    pub id: i16,
}

impl FieldHeader {
    pub fn stop() -> Self {
        Self {
            name: None,
            ttype: TType::Stop,
            id: 0,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.ttype == TType::Stop
    }
}

/// Header of a list or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHeader {
    pub elem: TType,
    pub size: usize,
}

/// Header of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub key: TType,
    pub value: TType,
    pub size: usize,
}

/// Reads protocol primitives from a message.
pub trait ProtocolRead {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError>;
    fn read_message_end(&mut self) -> Result<(), ProtocolError>;

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_end(&mut self) -> Result<(), ProtocolError>;

    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError>;
    fn read_field_end(&mut self) -> Result<(), ProtocolError>;

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError>;
    fn read_list_end(&mut self) -> Result<(), ProtocolError>;
    fn read_set_begin(&mut self) -> Result<ListHeader, ProtocolError>;
    fn read_set_end(&mut self) -> Result<(), ProtocolError>;
    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError>;
    fn read_map_end(&mut self) -> Result<(), ProtocolError>;

    fn read_bool(&mut self) -> Result<bool, ProtocolError>;
    fn read_byte(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;
    fn read_double(&mut self) -> Result<f64, ProtocolError>;
    fn read_binary(&mut self) -> Result<Bytes, ProtocolError>;

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let raw = self.read_binary()?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Skips one value of the given type, descending into containers.
    fn skip(&mut self, ttype: TType) -> Result<(), ProtocolError> {
        skip_value(self, ttype, MAX_SKIP_DEPTH)
    }
}

/// Writes protocol primitives into a message.
pub trait ProtocolWrite {
    fn write_message_begin(
        &mut self,
        name: &str,
        message_type: MessageType,
        seq_id: i32,
    ) -> Result<(), ProtocolError>;
    fn write_message_end(&mut self) -> Result<(), ProtocolError>;

    fn write_struct_begin(&mut self, name: &str) -> Result<(), ProtocolError>;
    fn write_struct_end(&mut self) -> Result<(), ProtocolError>;

    fn write_field_begin(&mut self, name: &str, ttype: TType, id: i16)
        -> Result<(), ProtocolError>;
    fn write_field_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_stop(&mut self) -> Result<(), ProtocolError>;

    fn write_list_begin(&mut self, elem: TType, size: usize) -> Result<(), ProtocolError>;
    fn write_list_end(&mut self) -> Result<(), ProtocolError>;
    fn write_set_begin(&mut self, elem: TType, size: usize) -> Result<(), ProtocolError>;
    fn write_set_end(&mut self) -> Result<(), ProtocolError>;
    fn write_map_begin(&mut self, key: TType, value: TType, size: usize)
        -> Result<(), ProtocolError>;
    fn write_map_end(&mut self) -> Result<(), ProtocolError>;

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError>;
    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError>;
    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError>;
    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError>;

    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.write_binary(value.as_bytes())
    }
}

fn skip_value<R: ProtocolRead + ?Sized>(
    r: &mut R,
    ttype: TType,
    depth: usize,
) -> Result<(), ProtocolError> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
    }

    match ttype {
        TType::Stop | TType::Void => Ok(()),
        TType::Bool => r.read_bool().map(drop),
        TType::Byte => r.read_byte().map(drop),
        TType::Double => r.read_double().map(drop),
        TType::I16 => r.read_i16().map(drop),
        TType::I32 => r.read_i32().map(drop),
        TType::I64 => r.read_i64().map(drop),
        TType::String => r.read_binary().map(drop),
        TType::Struct => {
            r.read_struct_begin()?;
            loop {
                let field = r.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                skip_value(r, field.ttype, depth - 1)?;
                r.read_field_end()?;
            }
            r.read_struct_end()
        }
        TType::Map => {
            let header = r.read_map_begin()?;
            check_element(header.key, header.size)?;
            check_element(header.value, header.size)?;
            for _ in 0..header.size {
                skip_value(r, header.key, depth - 1)?;
                skip_value(r, header.value, depth - 1)?;
            }
            r.read_map_end()
        }
        TType::Set => {
            let header = r.read_set_begin()?;
            check_element(header.elem, header.size)?;
            for _ in 0..header.size {
                skip_value(r, header.elem, depth - 1)?;
            }
            r.read_set_end()
        }
        TType::List => {
            let header = r.read_list_begin()?;
            check_element(header.elem, header.size)?;
            for _ in 0..header.size {
                skip_value(r, header.elem, depth - 1)?;
            }
            r.read_list_end()
        }
        TType::Generic => Err(ProtocolError::InvalidWireType(TType::Generic.to_u8())),
    }
}

// Elements without a wire representation would let a huge size spin forever.
fn check_element(ttype: TType, size: usize) -> Result<(), ProtocolError> {
    if size > 0 && !ttype.is_value() {
        return Err(ProtocolError::InvalidWireType(ttype.to_u8()));
    }
    Ok(())
}
