//! Tandem production server.
//!
//! Production server implementation using TCP with newline framing, Tokio for
//! async I/O, and the local clock with cryptographic RNG.
//!
//! # Architecture
//!
//! [`ServerDriver`] is sans-IO: it consumes [`ServerEvent`]s and returns
//! [`ServerAction`]s. [`Server`] is the glue that runs it against real sockets:
//!
//! ```text
//!  accept task ─┐
//!  reader tasks ├──> event channel ──> event-loop thread (owns ServerDriver)
//!  operator     ┘                            │
//!                                            └──> per-connection writer queues
//! ```
//!
//! The event loop is a plain OS thread. Code delivery and transcript storage
//! are synchronous and may block on the network or disk; doing that on a
//! dedicated thread keeps the reactor free and keeps events strictly ordered.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes `ServerDriver` actions
//! - [`TcpTransport`]: listening socket
//! - [`SystemEnv`]: Production environment (local time, crypto RNG)
//! - [`auth`]: code delivery backends
//! - [`storage`]: transcript backends

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
mod auth_gate;
mod dispatch;
mod driver;
mod error;
mod pairing;
mod registry;
mod server_error;
pub mod storage;
mod system_env;
mod transport;
mod turn;

use std::{collections::HashMap, net::SocketAddr, time::Duration};

pub use auth::{Authenticator, MemoryAuthenticator, TelegramAuthenticator};
pub use auth_gate::AuthGate;
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
pub use registry::{Closed, SessionRegistry};
pub use server_error::DriverError;
pub use storage::{
    ChaoticTranscripts, FileTranscripts, MemoryTranscripts, RedbTranscripts, StorageError,
    TranscriptStore,
};
pub use system_env::SystemEnv;
use tandem_core::SessionId;
use tandem_proto::{OperatorCommand, replies};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt},
    net::TcpStream,
    runtime::Handle,
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
};
pub use transport::TcpTransport;
use transport::{Inbound, read_lines, write_lines};

/// How long shutdown waits for each connection's queued output.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default depth of each connection's outbound queue, in messages.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:9090")
    pub bind_address: String,
    /// Driver configuration (limits)
    pub driver: DriverConfig,
    /// Messages queued per connection before it counts as stalled and is
    /// dropped
    pub outbound_queue: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
            driver: DriverConfig::default(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

/// Production Tandem server.
///
/// Wraps `ServerDriver` with the TCP transport and system environment.
pub struct Server<A = Box<dyn Authenticator>, T = Box<dyn TranscriptStore>>
where
    A: Authenticator,
    T: TranscriptStore,
{
    driver: ServerDriver<SystemEnv, A, T>,
    transport: TcpTransport,
    outbound_queue: usize,
}

impl<A, T> Server<A, T>
where
    A: Authenticator,
    T: TranscriptStore,
{
    /// Create and bind a new server.
    pub async fn bind(
        config: ServerRuntimeConfig,
        authenticator: A,
        transcripts: T,
    ) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(SystemEnv::new(), authenticator, transcripts, config.driver);
        let transport = TcpTransport::bind(&config.bind_address).await?;

        Ok(Self { driver, transport, outbound_queue: config.outbound_queue.max(1) })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run until the operator sends `shutdown`.
    ///
    /// `operator` is the operator channel, one command per line (stdin in the
    /// binary). End of input on it is not a shutdown.
    ///
    /// The driver is dropped on the event-loop thread, outside the async
    /// context, so collaborators holding blocking clients shut down cleanly.
    pub async fn run<R>(self, operator: R) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let (events, inbox) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(self.transport, events.clone()));
        let operator_task = tokio::spawn(operator_loop(operator, events.clone()));

        let event_loop = EventLoop {
            driver: self.driver,
            runtime: Handle::current(),
            events,
            outbound_queue: self.outbound_queue,
            peers: HashMap::new(),
            closing: Vec::new(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("tandem-events".to_string())
            .spawn(move || {
                let closing = event_loop.run(inbox);
                let _ = done_tx.send(closing);
            })
            .map_err(|e| ServerError::Internal(format!("failed to spawn event loop: {e}")))?;

        let closing = done_rx
            .await
            .map_err(|_| ServerError::Internal("event loop exited without reporting".to_string()))?;

        accept_task.abort();
        operator_task.abort();

        for writer in closing {
            if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
                tracing::warn!("gave up flushing a connection during shutdown");
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Everything the event loop can be woken by.
enum RuntimeEvent {
    Accepted(TcpStream, SocketAddr),
    Connection(Inbound),
    Operator(String),
}

async fn accept_loop(transport: TcpTransport, events: mpsc::UnboundedSender<RuntimeEvent>) {
    loop {
        match transport.accept().await {
            Ok((stream, peer)) => {
                if events.send(RuntimeEvent::Accepted(stream, peer)).is_err() {
                    return;
                }
            },
            Err(e) => tracing::error!("Accept error: {}", e),
        }
    }
}

async fn operator_loop<R>(operator: R, events: mpsc::UnboundedSender<RuntimeEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = operator.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if events.send(RuntimeEvent::Operator(line)).is_err() {
                    return;
                }
            },
            Ok(None) => {
                tracing::debug!("operator channel closed");
                return;
            },
            Err(e) => {
                tracing::warn!("operator channel failed: {}", e);
                return;
            },
        }
    }
}

struct Peer {
    queue: mpsc::Sender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Owns the driver and executes its actions. Runs on its own thread.
struct EventLoop<A: Authenticator, T: TranscriptStore> {
    driver: ServerDriver<SystemEnv, A, T>,
    runtime: Handle,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    outbound_queue: usize,
    peers: HashMap<SessionId, Peer>,
    /// Writers of closed connections still flushing
    closing: Vec<JoinHandle<()>>,
}

impl<A: Authenticator, T: TranscriptStore> EventLoop<A, T> {
    /// Process events until the driver terminates. Returns the writers still
    /// flushing.
    fn run(mut self, mut inbox: mpsc::UnboundedReceiver<RuntimeEvent>) -> Vec<JoinHandle<()>> {
        while let Some(event) = inbox.blocking_recv() {
            let result = match event {
                RuntimeEvent::Accepted(stream, peer) => Ok(self.admit(stream, peer)),
                RuntimeEvent::Connection(Inbound::Line(session, line)) => {
                    self.driver.process_event(ServerEvent::LineReceived { session, line })
                },
                RuntimeEvent::Connection(Inbound::Closed(session, reason)) => {
                    self.driver.process_event(ServerEvent::ConnectionClosed { session, reason })
                },
                RuntimeEvent::Operator(line) => match OperatorCommand::parse(&line) {
                    OperatorCommand::Shutdown => self.driver.process_event(ServerEvent::Shutdown),
                    OperatorCommand::Unknown(command) => {
                        tracing::warn!(command = %command, "unknown operator command");
                        continue;
                    },
                },
            };

            match result {
                Ok(actions) => {
                    if self.execute(actions) {
                        break;
                    }
                },
                Err(e) => tracing::debug!("event dropped: {}", e),
            }
        }

        self.closing
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) -> Vec<ServerAction> {
        match self.driver.accept_connection() {
            Ok((session, actions)) => {
                let (read_half, write_half) = stream.into_split();
                let (queue, pending) = mpsc::channel(self.outbound_queue);
                let events = self.events.clone();

                let writer = self.runtime.spawn(write_lines(session, write_half, pending));
                let reader = self.runtime.spawn(read_lines(session, read_half, move |inbound| {
                    events.send(RuntimeEvent::Connection(inbound)).is_ok()
                }));

                self.peers.insert(session, Peer { queue, reader, writer });
                tracing::info!(session = %session, peer = %peer, "connection accepted");
                actions
            },
            Err(e) => {
                tracing::warn!(peer = %peer, "refusing connection: {}", e);
                let notice = match e {
                    DriverError::ShuttingDown => replies::server_shutdown(),
                    _ => replies::server_full(),
                };
                self.runtime.spawn(async move {
                    let mut stream = stream;
                    let _ = stream.write_all(notice.encode().as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
                Vec::new()
            },
        }
    }

    /// Execute actions in order. Returns true on `Terminate`.
    ///
    /// A connection whose outbound queue is full is not reading; it is
    /// dropped once the batch is done, as if the peer had hung up.
    fn execute(&mut self, actions: Vec<ServerAction>) -> bool {
        let mut terminate = false;
        let mut stalled = Vec::new();
        for action in actions {
            match action {
                ServerAction::Send { session, message } => match self.peers.get(&session) {
                    Some(peer) => match peer.queue.try_send(message.encode()) {
                        Ok(()) => {},
                        Err(TrySendError::Full(_)) => stalled.push(session),
                        Err(TrySendError::Closed(_)) => {
                            tracing::debug!(session = %session, "writer already gone");
                        },
                    },
                    None => tracing::debug!(session = %session, "send to unknown session"),
                },
                ServerAction::Close { session, reason } => {
                    if let Some(peer) = self.peers.remove(&session) {
                        peer.reader.abort();
                        drop(peer.queue);
                        self.closing.retain(|writer| !writer.is_finished());
                        self.closing.push(peer.writer);
                        tracing::info!(session = %session, "Closing connection: {}", reason);
                    }
                },
                ServerAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
                ServerAction::Terminate => terminate = true,
            }
        }

        for session in stalled {
            terminate |= self.drop_stalled(session);
        }
        terminate
    }

    /// Tear down a connection that stopped draining its output and let the
    /// driver handle it as a disconnect.
    fn drop_stalled(&mut self, session: SessionId) -> bool {
        let Some(peer) = self.peers.remove(&session) else {
            return false;
        };
        peer.reader.abort();
        peer.writer.abort();
        tracing::warn!(session = %session, "outbound queue full, dropping connection");

        let event =
            ServerEvent::ConnectionClosed { session, reason: "outbound queue full".to_string() };
        match self.driver.process_event(event) {
            Ok(actions) => self.execute(actions),
            Err(e) => {
                tracing::debug!("stalled session already gone: {}", e);
                false
            },
        }
    }
}
