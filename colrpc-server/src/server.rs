//! TCP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::Handler;
use crate::metrics::{run_metrics_server, Metrics};
use crate::processor::Processor;
use crate::session::Session;
use colrpc_protocol::{BinaryReader, BinaryWriter, Decoder, Encoder, DEFAULT_PORT, MAX_FRAME_SIZE};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest request frame accepted.
    pub max_frame_size: u32,
    /// Reject message headers without a version word.
    pub strict_read: bool,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
    /// Address of the HTTP metrics endpoint, started by [`Server::run`].
    pub metrics_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("max_frame_size", &self.max_frame_size)
            .field("strict_read", &self.strict_read)
            .field("metrics_enabled", &self.metrics.is_some())
            .field("metrics_addr", &self.metrics_addr)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 1000,
            max_frame_size: MAX_FRAME_SIZE,
            strict_read: false,
            metrics: None,
            metrics_addr: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the runtime settings from a loaded [`Config`], registering
    /// metrics when they are enabled.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let mut server_config = Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
            max_frame_size: config.protocol.max_frame_bytes,
            strict_read: config.protocol.strict_read,
            metrics: None,
            metrics_addr: None,
        };
        if config.metrics.enabled {
            server_config = server_config
                .with_metrics(Arc::new(Metrics::new()?))
                .with_metrics_addr(config.metrics.bind_addr);
        }
        Ok(server_config)
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Serves the metrics registry over HTTP at `addr`.
    pub fn with_metrics_addr(mut self, addr: SocketAddr) -> Self {
        self.metrics_addr = Some(addr);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server dispatching calls to a [`Handler`].
pub struct Server<H> {
    config: ServerConfig,
    processor: Arc<Processor<H>>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl<H: Handler> Server<H> {
    /// Creates a new server.
    pub fn new(config: ServerConfig, handler: H) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut processor = Processor::new(handler);
        if let Some(ref metrics) = config.metrics {
            processor = processor.with_metrics(metrics.clone());
        }
        Self {
            config,
            processor: Arc::new(processor),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server, along with the
    /// metrics endpoint when one is configured.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        if let (Some(metrics), Some(addr)) = (&self.config.metrics, self.config.metrics_addr) {
            let metrics = metrics.clone();
            let shutdown = self.shutdown.subscribe();
            tokio::spawn(async move {
                if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            });
        }

        self.serve(listener).await
    }

    /// Runs the server on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                if let Some(ref metrics) = self.config.metrics {
                                    metrics.connections_rejected.inc();
                                }
                                continue;
                            }

                            tcp_stream.set_nodelay(true).ok();
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let processor = self.processor.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    tcp_stream,
                                    addr,
                                    processor,
                                    &config,
                                    &stats,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    if let Some(ref metrics) = config.metrics {
                                        metrics.errors_total.with_label_values(&[e.kind()]).inc();
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(ref metrics) = config.metrics {
                                    metrics.connections_active.dec();
                                }

                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Serves one connection until the peer disconnects, the connection
    /// idles out, a malformed message arrives or the server shuts down.
    pub async fn handle_connection<S>(
        mut stream: S,
        addr: SocketAddr,
        processor: Arc<Processor<H>>,
        config: &ServerConfig,
        stats: &ServerStats,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut session = Session::new(addr);
        tracing::info!("Client connected: {} (session {})", addr, session.id);

        let mut decoder = Decoder::with_max_frame_size(config.max_frame_size);
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!(
                                "[{}] Connection closed by client after {} requests ({:?})",
                                addr,
                                session.request_count(),
                                session.age()
                            );
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(config.idle_timeout) => {
                    if session.idle_duration() >= config.idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            loop {
                let payload = match decoder.decode_frame() {
                    Ok(Some(payload)) => payload,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("[{}] Rejecting frame: {}", addr, e);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        return Err(e.into());
                    }
                };

                session.record_request();
                stats.requests_total.fetch_add(1, Ordering::Relaxed);

                let mut input = BinaryReader::new(payload).with_strict_read(config.strict_read);
                let mut output = BinaryWriter::new();
                let outcome = processor.process(&mut input, &mut output).await;

                if !output.is_empty() {
                    let frame = Encoder::encode_frame(output.into_bytes(), MAX_FRAME_SIZE)?;
                    tracing::debug!("[{}] Writing {} bytes", addr, frame.len());
                    stream.write_all(&frame).await?;
                    stream.flush().await?;
                }

                match outcome {
                    Ok(true) => {}
                    Ok(false) => {
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!("[{}] Protocol error, closing connection: {}", addr, e);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn processor(&self) -> &Arc<Processor<H>> {
        &self.processor
    }
}
