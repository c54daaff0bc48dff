//! Connection configuration and the framed call session.

use crate::error::ClientError;
use bytes::Bytes;
use colrpc_protocol::service::{Call, Reply, Success};
use colrpc_protocol::{
    envelope, ApplicationException, ApplicationExceptionKind, BinaryReader, Decoder, Encoder,
    MessageType, ProtocolError, ProtocolRead, Record, MAX_FRAME_SIZE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Time allowed for a reply to arrive. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Largest reply frame accepted.
    pub max_frame_size: u32,
    /// Reject message headers without a version word.
    pub strict_read: bool,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(30)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
            strict_read: false,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size.clamp(1, MAX_FRAME_SIZE);
        self
    }

    pub fn with_strict_read(mut self, strict: bool) -> Self {
        self.strict_read = strict;
        self
    }
}

/// One logical call session over a byte stream.
///
/// The session owns the transport, the frame decoder and the sequence
/// counter. At most one call is in flight: every `send_*` must be followed
/// by the matching `recv_*` before the next send.
pub struct Session<S> {
    stream: S,
    decoder: Decoder,
    read_buf: Vec<u8>,
    seq_id: i32,
    usable: bool,
    request_timeout: Option<Duration>,
    strict_read: bool,
}

impl Session<TcpStream> {
    /// Opens a TCP connection and wraps it in a session.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("Connection failed: {}", e);
                ClientError::Io(e)
            })?;
        stream.set_nodelay(true).ok();

        tracing::debug!("Connected to {}", config.addr);
        Ok(Self::with_config(stream, config))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established stream with default settings.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            read_buf: vec![0u8; DEFAULT_READ_BUFFER_SIZE],
            seq_id: 0,
            usable: true,
            request_timeout: Some(Duration::from_secs(30)),
            strict_read: false,
        }
    }

    /// Wraps an established stream using the limits of `config`.
    pub fn with_config(stream: S, config: &ConnectionConfig) -> Self {
        Self {
            stream,
            decoder: Decoder::with_max_frame_size(config.max_frame_size),
            read_buf: vec![0u8; config.read_buffer_size],
            seq_id: 0,
            usable: true,
            request_timeout: config.request_timeout,
            strict_read: config.strict_read,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sequence id of the last call sent.
    pub fn seq_id(&self) -> i32 {
        self.seq_id
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Writes one `CALL` message for `args`.
    pub async fn send_call<C: Call>(&mut self, args: &C) -> Result<(), ClientError> {
        self.ensure_usable()?;
        self.seq_id = self.seq_id.wrapping_add(1);
        let frame = Encoder::encode_call(self.seq_id, args)?;

        tracing::debug!(
            "Sending {} seq_id={} ({} bytes)",
            C::METHOD,
            self.seq_id,
            frame.len()
        );

        let written = async {
            self.stream.write_all(&frame).await?;
            self.stream.flush().await
        }
        .await;
        if let Err(e) = written {
            self.usable = false;
            return Err(ClientError::Io(e));
        }
        Ok(())
    }

    /// Reads the reply to the last call sent.
    pub async fn recv_reply<C: Call>(&mut self) -> Result<Success<C>, ClientError> {
        self.ensure_usable()?;
        let result = self.read_reply::<C>().await;
        if let Err(err) = &result {
            if err.is_session_fatal() {
                tracing::warn!("{} failed, closing session: {}", C::METHOD, err);
                self.usable = false;
            }
        }
        result
    }

    /// Shuts the stream down. The session is unusable afterwards.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.usable = false;
        self.stream.shutdown().await?;
        Ok(())
    }

    fn ensure_usable(&self) -> Result<(), ClientError> {
        if self.usable {
            Ok(())
        } else {
            Err(ClientError::SessionUnusable)
        }
    }

    async fn read_reply<C: Call>(&mut self) -> Result<Success<C>, ClientError> {
        let payload = self.read_frame().await?;
        let mut input = BinaryReader::new(payload).with_strict_read(self.strict_read);
        let header = envelope::read_message(&mut input)?;

        tracing::debug!(
            "Received {} {} seq_id={}",
            header.message_type,
            header.name,
            header.seq_id
        );

        if header.message_type == MessageType::Exception {
            let exception = ApplicationException::decode(&mut input)?;
            input.read_message_end()?;
            return Err(ClientError::Application(exception));
        }
        if header.seq_id != self.seq_id {
            return Err(failure::<C>(
                ApplicationExceptionKind::BAD_SEQUENCE_ID,
                "out of sequence response",
            ));
        }
        if header.name != C::METHOD {
            return Err(failure::<C>(
                ApplicationExceptionKind::WRONG_METHOD_NAME,
                "wrong method name",
            ));
        }
        if header.message_type != MessageType::Reply {
            return Err(failure::<C>(
                ApplicationExceptionKind::INVALID_MESSAGE_TYPE,
                "invalid message type",
            ));
        }

        let reply = match <C::Reply as Record>::decode(&mut input) {
            Ok(reply) => reply,
            Err(ProtocolError::MissingResult { .. }) => {
                return Err(failure::<C>(
                    ApplicationExceptionKind::MISSING_RESULT,
                    "unknown result",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        input.read_message_end()?;

        reply.into_result().map_err(ClientError::Operation)
    }

    async fn read_frame(&mut self) -> Result<Bytes, ClientError> {
        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.fill_frame())
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => self.fill_frame().await,
        }
    }

    async fn fill_frame(&mut self) -> Result<Bytes, ClientError> {
        loop {
            if let Some(payload) = self.decoder.decode_frame()? {
                return Ok(payload);
            }
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                tracing::debug!("Connection closed by server");
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

fn failure<C: Call>(kind: ApplicationExceptionKind, what: &str) -> ClientError {
    ClientError::Application(ApplicationException::new(
        kind,
        format!("{} failed: {}", C::METHOD, what),
    ))
}
