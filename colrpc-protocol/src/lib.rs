//! # colrpc-protocol
//!
//! Wire protocol for colrpc, the column-family RPC interface.
//!
//! This crate provides:
//! - Length-prefixed framing for binary protocol messages
//! - The binary protocol primitives and typed skip
//! - Call/reply/exception envelopes with sequence ids
//! - Tagged field records (`wire_struct!`) and wire enums (`wire_enum!`)
//! - The domain type catalog and the per-operation `*Args`/`*Result` records

#[macro_use]
mod macros;

pub mod binary;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod field;
pub mod frame;
pub mod service;
pub mod types;
pub mod wire;

pub use binary::{BinaryReader, BinaryWriter};
pub use bytes::Bytes;
pub use codec::{Decoder, Encoder};
pub use envelope::{
    ApplicationException, ApplicationExceptionKind, MessageHeader, MessageType,
};
pub use error::ProtocolError;
pub use field::{FieldSpec, Record, WireValue};
pub use frame::{Frame, FRAME_HEADER_SIZE};
pub use service::{Call, DeclaredException, Operation, OperationError, Reply, Success};
pub use wire::{FieldHeader, ListHeader, MapHeader, ProtocolRead, ProtocolWrite, TType};

/// Version word of the strict binary message header.
pub const VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of a strict message header.
pub const VERSION_MASK: u32 = 0xffff_0000;

/// Default port for a colrpc server.
pub const DEFAULT_PORT: u16 = 9160;

/// Maximum frame payload size (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Maximum nesting depth accepted when skipping unknown values.
pub const MAX_SKIP_DEPTH: usize = 64;
