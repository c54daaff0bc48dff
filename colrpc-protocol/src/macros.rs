//! Record and enum generators.
//!
//! `wire_struct!` turns a schema declaration into a plain Rust struct plus its
//! [`Record`](crate::Record) and [`WireValue`](crate::WireValue) impls.
//! Each field is declared as
//!
//! ```text
//! <id>: required <name>: <type> [= <default>]
//! <id>: optional <name>: <type> [= <default>]
//! ```
//!
//! Required fields are stored as `T`, always written, and must be present on
//! read. Optional fields are stored as `Option<T>` and written only when set;
//! an optional field with a default starts out as `Some(default)` both on
//! construction and at the start of a read.
//!
//! `wire_enum!` produces an `i32` newtype with one associated constant per
//! declared value. Undeclared values survive a round trip unchanged.

/// Generates tagged field records.
#[macro_export]
macro_rules! wire_struct {
    ($(
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $id:literal : $kind:ident $field:ident : $ty:ty $(= $default:expr)?
            ),* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $crate::__field_ty!($kind $ty),
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $crate::__field_default!($kind $ty $(, $default)?), )*
                }
            }
        }

        impl $crate::Record for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [$crate::FieldSpec] = &[
                $(
                    $crate::FieldSpec {
                        id: $id,
                        name: stringify!($field),
                        ttype: <$ty as $crate::WireValue>::TTYPE,
                    },
                )*
            ];

            fn encode<W: $crate::ProtocolWrite>(
                &self,
                w: &mut W,
            ) -> ::core::result::Result<(), $crate::ProtocolError> {
                w.write_struct_begin(<Self as $crate::Record>::NAME)?;
                $( $crate::__field_write!($kind w, self.$field, $id, $field, $ty); )*
                w.write_field_stop()?;
                w.write_struct_end()
            }

            #[allow(unused_variables)]
            fn decode<R: $crate::ProtocolRead>(
                r: &mut R,
            ) -> ::core::result::Result<Self, $crate::ProtocolError> {
                $(
                    let mut $field: ::core::option::Option<$ty> =
                        $crate::__field_slot!($kind $ty $(, $default)?);
                )*
                $crate::field::read_struct(
                    r,
                    <Self as $crate::Record>::NAME,
                    <Self as $crate::Record>::FIELDS,
                    |r, field_id| {
                        match field_id {
                            $( $id => $field = Some(<$ty as $crate::WireValue>::read(r)?), )*
                            _ => {}
                        }
                        Ok(())
                    },
                )?;
                Ok(Self {
                    $( $field: $crate::__field_finish!($kind $field, $name), )*
                })
            }
        }

        impl $crate::WireValue for $name {
            const TTYPE: $crate::TType = $crate::TType::Struct;

            fn write<W: $crate::ProtocolWrite>(
                &self,
                w: &mut W,
            ) -> ::core::result::Result<(), $crate::ProtocolError> {
                $crate::Record::encode(self, w)
            }

            fn read<R: $crate::ProtocolRead>(
                r: &mut R,
            ) -> ::core::result::Result<Self, $crate::ProtocolError> {
                <Self as $crate::Record>::decode(r)
            }
        }
    )*};
}

/// Generates `i32` wire enums.
#[macro_export]
macro_rules! wire_enum {
    ($(
        $(#[$meta:meta])*
        pub enum $name:ident {
            $first:ident = $first_value:literal
            $(, $variant:ident = $value:literal)* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i32);

        impl $name {
            pub const $first: Self = Self($first_value);
            $( pub const $variant: Self = Self($value); )*

            /// Every declared value, in declaration order.
            pub const VALUES: &'static [Self] = &[Self::$first $(, Self::$variant)*];

            /// Returns the declared name, or `None` for an undeclared value.
            pub fn name(&self) -> ::core::option::Option<&'static str> {
                match self.0 {
                    $first_value => Some(stringify!($first)),
                    $( $value => Some(stringify!($variant)), )*
                    _ => None,
                }
            }

            /// Looks up a declared value by name, ignoring ASCII case.
            pub fn from_name(name: &str) -> ::core::option::Option<Self> {
                Self::VALUES
                    .iter()
                    .copied()
                    .find(|value| value.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            }

            pub fn value(&self) -> i32 {
                self.0
            }
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self.name() {
                    Some(name) => write!(f, "{}::{}", stringify!($name), name),
                    None => write!(f, "{}({})", stringify!($name), self.0),
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}", self.0),
                }
            }
        }

        impl ::core::convert::From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl ::core::convert::From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value.0
            }
        }

        impl $crate::WireValue for $name {
            const TTYPE: $crate::TType = $crate::TType::I32;

            fn write<W: $crate::ProtocolWrite>(
                &self,
                w: &mut W,
            ) -> ::core::result::Result<(), $crate::ProtocolError> {
                w.write_i32(self.0)
            }

            fn read<R: $crate::ProtocolRead>(
                r: &mut R,
            ) -> ::core::result::Result<Self, $crate::ProtocolError> {
                r.read_i32().map(Self)
            }
        }
    )*};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_ty {
    (required $ty:ty) => { $ty };
    (optional $ty:ty) => { ::core::option::Option<$ty> };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_default {
    (required $ty:ty) => { <$ty as ::core::default::Default>::default() };
    (required $ty:ty, $default:expr) => { ::core::convert::Into::<$ty>::into($default) };
    (optional $ty:ty) => { ::core::option::Option::None };
    (optional $ty:ty, $default:expr) => {
        ::core::option::Option::Some(::core::convert::Into::<$ty>::into($default))
    };
}

// Initial value of a field slot before a read.
#[doc(hidden)]
#[macro_export]
macro_rules! __field_slot {
    (required $ty:ty $(, $default:expr)?) => { ::core::option::Option::None };
    (optional $ty:ty) => { ::core::option::Option::None };
    (optional $ty:ty, $default:expr) => {
        ::core::option::Option::Some(::core::convert::Into::<$ty>::into($default))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_finish {
    (required $field:ident, $record:ident) => {
        match $field {
            ::core::option::Option::Some(value) => value,
            ::core::option::Option::None => {
                return ::core::result::Result::Err($crate::ProtocolError::MissingField {
                    record: stringify!($record),
                    field: stringify!($field),
                })
            }
        }
    };
    (optional $field:ident, $record:ident) => { $field };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_write {
    (required $w:ident, $value:expr, $id:literal, $field:ident, $ty:ty) => {
        $w.write_field_begin(stringify!($field), <$ty as $crate::WireValue>::TTYPE, $id)?;
        $crate::WireValue::write(&$value, $w)?;
        $w.write_field_end()?;
    };
    (optional $w:ident, $value:expr, $id:literal, $field:ident, $ty:ty) => {
        if let ::core::option::Option::Some(value) = &$value {
            $w.write_field_begin(stringify!($field), <$ty as $crate::WireValue>::TTYPE, $id)?;
            $crate::WireValue::write(value, $w)?;
            $w.write_field_end()?;
        }
    };
}
