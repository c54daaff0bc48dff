//! Client error types.

use colrpc_protocol::{ApplicationException, ApplicationExceptionKind, OperationError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] colrpc_protocol::ProtocolError),

    #[error("{0}")]
    Application(#[from] ApplicationException),

    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("session is no longer usable")]
    SessionUnusable,
}

impl ClientError {
    /// Returns whether the session must be reopened after this error.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            ClientError::Io(_)
            | ClientError::ConnectionClosed
            | ClientError::Timeout
            | ClientError::Protocol(_)
            | ClientError::SessionUnusable => true,
            ClientError::Application(exception) => {
                exception.kind() == ApplicationExceptionKind::BAD_SEQUENCE_ID
            }
            ClientError::Operation(_) => false,
        }
    }

    /// Returns the declared exception, if the server returned one.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            ClientError::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the application exception kind, if any.
    pub fn application_kind(&self) -> Option<ApplicationExceptionKind> {
        match self {
            ClientError::Application(exception) => Some(exception.kind()),
            _ => None,
        }
    }
}
