//! Service handler trait.
//!
//! [`Handler`] has one method per remote operation, generated from the
//! operation catalog. Arguments arrive unpacked, with optional arguments
//! already filled with their declared defaults. Methods that are not
//! overridden fail with [`HandlerError::Internal`], which the processor
//! reports to the caller as an `INTERNAL_ERROR` application exception.

use colrpc_protocol::service::*;
use thiserror::Error;

/// Failure returned by a handler method.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// A declared exception, returned to the caller in the result record.
    #[error("{0}")]
    Declared(#[from] OperationError),

    /// Any other failure. The caller receives an `INTERNAL_ERROR`.
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }
}

macro_rules! declared_from {
    ($($ty:ident),* $(,)?) => {$(
        impl From<colrpc_protocol::types::$ty> for HandlerError {
            fn from(exception: colrpc_protocol::types::$ty) -> Self {
                HandlerError::Declared(exception.into())
            }
        }
    )*};
}

declared_from!(
    InvalidRequestException,
    NotFoundException,
    UnavailableException,
    TimedOutException,
    AuthenticationException,
    AuthorizationException,
    SchemaDisagreementException,
);

macro_rules! define_handler {
    ($(
        $(#[$doc:meta])*
        $method:ident ($send:ident, $recv:ident) => $variant:ident, $args:ident, $result:ident {
            $($id:literal : $kind:ident $arg:ident : $argty:ty $(= $default:expr)?),* $(,)?
        } returns $ret:tt throws {
            $($xid:literal : $slot:ident : $xty:ty),* $(,)?
        };
    )*) => {
        /// Server-side implementation of the remote operations.
        #[async_trait::async_trait]
        pub trait Handler: Send + Sync + 'static {
            $(
                $(#[$doc])*
                async fn $method(&self, $($arg: $argty),*) -> Result<Success<$args>, HandlerError> {
                    let _ = ($($arg,)*);
                    Err(HandlerError::Internal(format!(
                        "{} not implemented",
                        stringify!($method)
                    )))
                }
            )*
        }
    };
}

colrpc_protocol::service!(define_handler);
