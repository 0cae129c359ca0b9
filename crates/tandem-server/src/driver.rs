//! Server driver.
//!
//! Owns the session registry, the login gate and the transcript store, and
//! turns runtime events into actions. No I/O happens here: the production
//! runtime and the simulation harness both feed events in and execute the
//! returned actions in order.

use tandem_core::{Environment, Lifecycle, SessionId};
use tandem_proto::{Outbound, replies};

use crate::{
    auth::Authenticator,
    auth_gate::{AuthGate, CodeCheck},
    registry::SessionRegistry,
    server_error::DriverError,
    storage::TranscriptStore,
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// One complete line arrived on a connection (delimiter stripped)
    LineReceived {
        /// Connection the line came from
        session: SessionId,
        /// Line text
        line: String,
    },

    /// A connection ended (peer closed, read error, oversized line)
    ConnectionClosed {
        /// Connection that was closed
        session: SessionId,
        /// Reason for closure
        reason: String,
    },

    /// Operator asked the server to stop
    Shutdown,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation), in
/// order. A `Send` queued before a `Close` for the same session is delivered
/// before the connection is shut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Write a message to one session
    Send {
        /// Target session
        session: SessionId,
        /// Message to write
        message: Outbound,
    },

    /// Close a connection after flushing what was already sent to it
    Close {
        /// Session to close
        session: SessionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },

    /// Stop accepting work and exit the event loop
    Terminate,
}

impl ServerAction {
    /// `Send` shorthand.
    pub fn send(session: SessionId, message: Outbound) -> Self {
        Self::Send { session, message }
    }

    /// `Log` shorthand.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log { level, message: message.into() }
    }
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
///
/// Handles one event at a time to completion. Callers serialise events
/// (the runtime funnels every connection into one channel), which is what
/// makes the registry invariants hold without locking.
pub struct ServerDriver<E, A, T>
where
    E: Environment,
    A: Authenticator,
    T: TranscriptStore,
{
    /// Live sessions and identity index
    pub(crate) registry: SessionRegistry,
    /// Login code delivery and verification
    pub(crate) gate: AuthGate<A>,
    /// Conversation history
    pub(crate) transcripts: T,
    /// Environment (time, RNG)
    pub(crate) env: E,
    config: DriverConfig,
    shutting_down: bool,
}

impl<E, A, T> ServerDriver<E, A, T>
where
    E: Environment,
    A: Authenticator,
    T: TranscriptStore,
{
    /// Create a new server driver.
    pub fn new(env: E, authenticator: A, transcripts: T, config: DriverConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            gate: AuthGate::new(authenticator),
            transcripts,
            env,
            config,
            shutting_down: false,
        }
    }

    /// Admit a new connection.
    ///
    /// Returns the new session and the actions greeting it.
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` when `max_connections` sessions are live
    /// - `ShuttingDown` once shutdown has started
    pub fn accept_connection(&mut self) -> Result<(SessionId, Vec<ServerAction>), DriverError> {
        if self.shutting_down {
            return Err(DriverError::ShuttingDown);
        }
        if self.registry.len() >= self.config.max_connections {
            return Err(DriverError::CapacityExceeded { limit: self.config.max_connections });
        }

        let session = self.registry.open();
        Ok((
            session,
            vec![
                ServerAction::send(session, replies::identity_prompt()),
                ServerAction::log(LogLevel::Debug, format!("session {session} opened")),
            ],
        ))
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for a line from a session that is already closed.
    /// Closing an unknown session is not an error.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::LineReceived { session, line } => self.handle_line(session, &line),
            ServerEvent::ConnectionClosed { session, reason } => {
                Ok(self.disconnect(session, &reason))
            },
            ServerEvent::Shutdown => Ok(self.shutdown()),
        }
    }

    fn handle_line(&mut self, session: SessionId, line: &str) -> Result<Vec<ServerAction>, DriverError> {
        let lifecycle =
            self.registry.get(session).ok_or(DriverError::SessionNotFound(session))?.lifecycle();
        let line = line.trim();

        match lifecycle {
            _ if line == "/exit" && lifecycle != Lifecycle::Authenticated => Ok(self.exit(session)),
            Lifecycle::Connecting => {
                Ok(self.gate.claim_identity(&mut self.registry, &self.env, session, line))
            },
            Lifecycle::AwaitingCode => self.handle_code(session, line),
            Lifecycle::Authenticated => Ok(self.dispatch(session, line)),
        }
    }

    fn handle_code(&mut self, session: SessionId, line: &str) -> Result<Vec<ServerAction>, DriverError> {
        let identity = match self.gate.submit_code(&self.registry, session, line) {
            CodeCheck::Verified(identity) => identity,
            CodeCheck::Mismatch => {
                return Ok(vec![ServerAction::send(session, replies::incorrect_code())]);
            },
            CodeCheck::NotPending => return Ok(Vec::new()),
        };

        let mut actions = Vec::new();

        // Last login wins.
        if let Some(previous) = self.registry.session_for(&identity) {
            if previous != session {
                actions.push(ServerAction::send(previous, replies::signed_in_elsewhere()));
                actions.extend(self.disconnect(previous, "signed in from another connection"));
            }
        }

        self.registry.authenticate(session)?;
        actions.push(ServerAction::send(session, replies::welcome(&identity)));
        actions.push(ServerAction::log(
            LogLevel::Info,
            format!("session {session} authenticated as {identity}"),
        ));
        Ok(actions)
    }

    /// `/exit`: say goodbye, then disconnect.
    pub(crate) fn exit(&mut self, session: SessionId) -> Vec<ServerAction> {
        let mut actions = vec![ServerAction::send(session, replies::goodbye())];
        actions.extend(self.disconnect(session, "client exited"));
        actions
    }

    /// Remove a session and tell whoever depended on it.
    ///
    /// No-op for a session that is already gone.
    pub(crate) fn disconnect(&mut self, session: SessionId, reason: &str) -> Vec<ServerAction> {
        let Some(closed) = self.registry.close(session) else {
            return Vec::new();
        };
        if let Some(claimed) = closed.session.pending_identity() {
            self.gate.abandon(&self.registry, claimed);
        }

        let mut actions = Vec::new();
        if let Some(partner) = closed.partner {
            actions.push(ServerAction::send(partner, replies::partner_left()));
        }

        let identity = closed.session.identity().unwrap_or("unauthenticated").to_string();
        if let Some(request) = closed.session.member().and_then(|m| m.pending_request()) {
            if let Some(waiting) = self.registry.requester_of(request) {
                actions.push(ServerAction::send(waiting, replies::request_withdrawn(&identity)));
            }
        }

        actions.push(ServerAction::Close { session, reason: reason.to_string() });
        actions.push(ServerAction::log(
            LogLevel::Info,
            format!("session {session} ({identity}) disconnected: {reason}"),
        ));
        actions
    }

    fn shutdown(&mut self) -> Vec<ServerAction> {
        if self.shutting_down {
            return vec![ServerAction::Terminate];
        }
        self.shutting_down = true;

        let mut actions = vec![ServerAction::log(
            LogLevel::Info,
            format!("shutting down with {} live sessions", self.registry.len()),
        )];
        for session in self.registry.drain() {
            if session.lifecycle() == Lifecycle::Authenticated {
                actions.push(ServerAction::send(session.id(), replies::server_shutdown()));
            }
            actions.push(ServerAction::Close {
                session: session.id(),
                reason: "server shutdown".to_string(),
            });
        }
        actions.push(ServerAction::Terminate);
        actions
    }

    /// Session registry (read-only).
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Transcript store.
    pub fn transcripts(&self) -> &T {
        &self.transcripts
    }

    /// Code delivery backend.
    pub fn authenticator(&self) -> &A {
        self.gate.authenticator()
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }
}

impl<E, A, T> std::fmt::Debug for ServerDriver<E, A, T>
where
    E: Environment,
    A: Authenticator,
    T: TranscriptStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("sessions", &self.registry.len())
            .field("config", &self.config)
            .field("shutting_down", &self.shutting_down)
            .finish_non_exhaustive()
    }
}
