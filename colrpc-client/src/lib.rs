//! # colrpc-client
//!
//! Client library for colrpc.
//!
//! This crate provides:
//! - A framed [`Session`] over any async byte stream
//! - `send_*` / `recv_*` / combined stubs for every remote operation
//! - A shareable [`Client`] that serialises calls on one connection

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{ConnectionConfig, Session};
pub use error::ClientError;
