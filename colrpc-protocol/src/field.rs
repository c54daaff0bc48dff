//! Tagged field codec shared by every generated record.

use crate::error::ProtocolError;
use crate::wire::{ProtocolRead, ProtocolWrite, TType};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Static description of one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: i16,
    pub name: &'static str,
    pub ttype: TType,
}

/// A value with a fixed wire type.
pub trait WireValue: Sized {
    const TTYPE: TType;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError>;
    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError>;
}

/// A struct-shaped message body.
pub trait Record: Sized {
    const NAME: &'static str;
    /// Declared fields in ascending id order.
    const FIELDS: &'static [FieldSpec];

    fn encode<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError>;
    fn decode<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError>;
}

/// Reads one struct, handing every declared field with a matching wire type
/// to `on_field` and skipping everything else.
pub fn read_struct<R, F>(
    r: &mut R,
    record: &'static str,
    fields: &[FieldSpec],
    mut on_field: F,
) -> Result<(), ProtocolError>
where
    R: ProtocolRead,
    F: FnMut(&mut R, i16) -> Result<(), ProtocolError>,
{
    r.read_struct_begin()?;
    loop {
        let mut header = r.read_field_begin()?;
        if header.is_stop() {
            break;
        }

        if header.id < 0 {
            if let Some(name) = header.name.as_deref() {
                if let Some(spec) = fields.iter().find(|spec| spec.name == name) {
                    header.id = spec.id;
                }
            }
        }

        let declared = fields.iter().find(|spec| spec.id == header.id);
        if header.ttype == TType::Generic {
            if let Some(spec) = declared {
                header.ttype = spec.ttype;
            }
        }

        match declared {
            Some(spec) if spec.ttype == header.ttype => on_field(r, spec.id)?,
            Some(spec) if header.ttype != TType::Void => {
                debug!(
                    "{}.{}: expected {:?}, got {:?}; skipping",
                    record, spec.name, spec.ttype, header.ttype
                );
                r.skip(header.ttype)?;
            }
            _ => r.skip(header.ttype)?,
        }
        r.read_field_end()?;
    }
    r.read_struct_end()
}

fn expect_element(expected: TType, actual: TType) -> Result<(), ProtocolError> {
    if expected != actual {
        return Err(ProtocolError::ElementTypeMismatch { expected, actual });
    }
    Ok(())
}

// Sizes come off the wire; don't let them drive the allocation.
const MAX_PREALLOC: usize = 1024;

impl WireValue for bool {
    const TTYPE: TType = TType::Bool;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_bool(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_bool()
    }
}

impl WireValue for i8 {
    const TTYPE: TType = TType::Byte;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_byte(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_byte()
    }
}

impl WireValue for i16 {
    const TTYPE: TType = TType::I16;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_i16(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_i16()
    }
}

impl WireValue for i32 {
    const TTYPE: TType = TType::I32;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_i32(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_i32()
    }
}

impl WireValue for i64 {
    const TTYPE: TType = TType::I64;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_i64(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_i64()
    }
}

impl WireValue for f64 {
    const TTYPE: TType = TType::Double;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_double(*self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_double()
    }
}

impl WireValue for String {
    const TTYPE: TType = TType::String;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_string(self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_string()
    }
}

impl WireValue for Bytes {
    const TTYPE: TType = TType::String;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_binary(self)
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        r.read_binary()
    }
}

impl<T: WireValue> WireValue for Vec<T> {
    const TTYPE: TType = TType::List;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_list_begin(T::TTYPE, self.len())?;
        for item in self {
            item.write(w)?;
        }
        w.write_list_end()
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        let header = r.read_list_begin()?;
        if header.size > 0 {
            expect_element(T::TTYPE, header.elem)?;
        }
        let mut items = Vec::with_capacity(header.size.min(MAX_PREALLOC));
        for _ in 0..header.size {
            items.push(T::read(r)?);
        }
        r.read_list_end()?;
        Ok(items)
    }
}

impl<T: WireValue + Ord> WireValue for BTreeSet<T> {
    const TTYPE: TType = TType::Set;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_set_begin(T::TTYPE, self.len())?;
        for item in self {
            item.write(w)?;
        }
        w.write_set_end()
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        let header = r.read_set_begin()?;
        if header.size > 0 {
            expect_element(T::TTYPE, header.elem)?;
        }
        let mut items = BTreeSet::new();
        for _ in 0..header.size {
            items.insert(T::read(r)?);
        }
        r.read_set_end()?;
        Ok(items)
    }
}

impl<K: WireValue + Ord, V: WireValue> WireValue for BTreeMap<K, V> {
    const TTYPE: TType = TType::Map;

    fn write<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_map_begin(K::TTYPE, V::TTYPE, self.len())?;
        for (key, value) in self {
            key.write(w)?;
            value.write(w)?;
        }
        w.write_map_end()
    }

    fn read<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
        let header = r.read_map_begin()?;
        if header.size > 0 {
            expect_element(K::TTYPE, header.key)?;
            expect_element(V::TTYPE, header.value)?;
        }
        let mut entries = BTreeMap::new();
        for _ in 0..header.size {
            let key = K::read(r)?;
            let value = V::read(r)?;
            entries.insert(key, value);
        }
        r.read_map_end()?;
        Ok(entries)
    }
}
