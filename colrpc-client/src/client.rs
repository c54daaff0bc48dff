//! Generated call stubs and the shared client.

use crate::connection::{ConnectionConfig, Session};
use crate::error::ClientError;
use colrpc_protocol::service::*;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};

/// Client for a colrpc server.
///
/// Calls are serialised: the session lock is held from the send of a request
/// until its reply has been read. Open more clients for parallel requests.
pub struct Client<S = TcpStream> {
    session: Mutex<Session<S>>,
}

impl Client<TcpStream> {
    /// Connects to the server described by `config`.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let session = Session::connect(&config).await?;
        Ok(Self::new(session))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(session: Session<S>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// Returns whether the underlying session can still carry calls.
    pub async fn is_usable(&self) -> bool {
        self.session.lock().await.is_usable()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.session.lock().await.close().await
    }

    /// Locks the session for a manual `send_*` / `recv_*` exchange.
    pub async fn session(&self) -> MutexGuard<'_, Session<S>> {
        self.session.lock().await
    }
}

macro_rules! call_arg {
    (required $arg:ident) => {
        $arg
    };
    (optional $arg:ident) => {
        Some($arg)
    };
}

macro_rules! define_client_calls {
    ($(
        $(#[$doc:meta])*
        $method:ident ($send:ident, $recv:ident) => $variant:ident, $args:ident, $result:ident {
            $($id:literal : $kind:ident $arg:ident : $argty:ty $(= $default:expr)?),* $(,)?
        } returns $ret:tt throws {
            $($xid:literal : $slot:ident : $xty:ty),* $(,)?
        };
    )*) => {
        impl<S> Session<S>
        where
            S: AsyncRead + AsyncWrite + Unpin + Send,
        {
            $(
                #[doc = concat!("Sends a `", stringify!($method), "` call.")]
                pub async fn $send(&mut self, $($arg: $argty),*) -> Result<(), ClientError> {
                    let args = $args {
                        $( $arg: call_arg!($kind $arg), )*
                    };
                    self.send_call(&args).await
                }

                #[doc = concat!("Reads the reply to a `", stringify!($method), "` call.")]
                pub async fn $recv(&mut self) -> Result<Success<$args>, ClientError> {
                    self.recv_reply::<$args>().await
                }

                $(#[$doc])*
                pub async fn $method(
                    &mut self,
                    $($arg: $argty),*
                ) -> Result<Success<$args>, ClientError> {
                    self.$send($($arg),*).await?;
                    self.$recv().await
                }
            )*
        }

        impl<S> Client<S>
        where
            S: AsyncRead + AsyncWrite + Unpin + Send,
        {
            $(
                $(#[$doc])*
                pub async fn $method(
                    &self,
                    $($arg: $argty),*
                ) -> Result<Success<$args>, ClientError> {
                    self.session.lock().await.$method($($arg),*).await
                }
            )*
        }
    };
}

colrpc_protocol::service!(define_client_calls);
