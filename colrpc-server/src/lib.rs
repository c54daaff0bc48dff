//! # colrpc-server
//!
//! TCP server for colrpc.
//!
//! This crate provides:
//! - The [`Handler`] trait with one method per remote operation
//! - A [`Processor`] that decodes calls, dispatches them and encodes replies
//! - TCP connection handling with async I/O
//! - YAML and environment configuration
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod processor;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, MetricsConfig, NetworkConfig, ProtocolConfig};
pub use error::ServerError;
pub use handler::{Handler, HandlerError};
pub use metrics::Metrics;
pub use processor::Processor;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;
