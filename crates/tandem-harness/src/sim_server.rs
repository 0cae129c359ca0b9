//! Simulation server wrapper.
//!
//! `SimServer` wraps `ServerDriver` with [`SimEnv`], a [`MemoryAuthenticator`]
//! and any transcript store, and executes the driver's actions in memory.
//! Every `Send` lands in the target's outbox, every `Close` marks the session
//! closed, and the standard invariants are checked after each event.
//!
//! Tests drive it explicitly; nothing runs on its own.

use std::collections::{HashMap, HashSet};

use tandem_core::SessionId;
use tandem_proto::Outbound;
use tandem_server::{
    DriverConfig, DriverError, LogLevel, MemoryAuthenticator, MemoryTranscripts, ServerAction,
    ServerDriver, ServerEvent, SessionRegistry, TranscriptStore,
};

use crate::{InvariantRegistry, RegistrySnapshot, SimEnv};

/// In-memory server for deterministic tests.
pub struct SimServer<T: TranscriptStore = MemoryTranscripts> {
    driver: ServerDriver<SimEnv, MemoryAuthenticator, T>,
    invariants: InvariantRegistry,
    /// Messages delivered to each session, oldest first
    outboxes: HashMap<SessionId, Vec<Outbound>>,
    closed: HashSet<SessionId>,
    logs: Vec<(LogLevel, String)>,
    terminated: bool,
    events: usize,
}

impl SimServer<MemoryTranscripts> {
    /// Server with in-memory transcripts and default limits.
    pub fn new() -> Self {
        Self::with_transcripts(MemoryTranscripts::new(), DriverConfig::default())
    }
}

impl Default for SimServer<MemoryTranscripts> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TranscriptStore> SimServer<T> {
    /// Server over `transcripts` with custom limits and seed 0.
    pub fn with_transcripts(transcripts: T, config: DriverConfig) -> Self {
        Self::with_env(SimEnv::new(), transcripts, config)
    }

    /// Server over an explicit environment.
    pub fn with_env(env: SimEnv, transcripts: T, config: DriverConfig) -> Self {
        let driver = ServerDriver::new(env, MemoryAuthenticator::new(), transcripts, config);
        Self {
            driver,
            invariants: InvariantRegistry::standard(),
            outboxes: HashMap::new(),
            closed: HashSet::new(),
            logs: Vec::new(),
            terminated: false,
            events: 0,
        }
    }

    /// Open a connection, as if a client had just connected.
    pub fn connect(&mut self) -> Result<SessionId, DriverError> {
        let (session, actions) = self.driver.accept_connection()?;
        self.outboxes.entry(session).or_default();
        self.execute(actions);
        self.check(&format!("after accepting {session}"));
        Ok(session)
    }

    /// Deliver one line from `session`.
    pub fn send(&mut self, session: SessionId, line: &str) -> Result<(), DriverError> {
        self.process(ServerEvent::LineReceived { session, line: line.to_string() })
    }

    /// The client side of `session` goes away.
    pub fn drop_connection(&mut self, session: SessionId) -> Result<(), DriverError> {
        self.process(ServerEvent::ConnectionClosed {
            session,
            reason: "connection closed by peer".to_string(),
        })
    }

    /// Operator shutdown.
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        self.process(ServerEvent::Shutdown)
    }

    /// Connect and log in as `identity`, entering the code the authenticator
    /// delivered. Outboxes are left untouched.
    ///
    /// If delivery fails the session is left unauthenticated.
    pub fn login(&mut self, identity: &str) -> Result<SessionId, DriverError> {
        let session = self.connect()?;
        self.send(session, identity)?;
        if let Some(code) = self.driver.authenticator().last_code(identity) {
            self.send(session, &code)?;
        }
        Ok(session)
    }

    /// `requester` asks for `responder` and `responder` accepts.
    pub fn pair(&mut self, requester: SessionId, responder: SessionId) -> Result<(), DriverError> {
        let target = self
            .driver
            .registry()
            .get(responder)
            .and_then(|s| s.identity())
            .map(str::to_string)
            .ok_or(DriverError::SessionNotFound(responder))?;
        self.send(requester, &format!("/connect {target}"))?;
        self.send(responder, "yes")
    }

    /// Drain everything delivered to `session` so far.
    pub fn take(&mut self, session: SessionId) -> Vec<Outbound> {
        self.outboxes.get_mut(&session).map(std::mem::take).unwrap_or_default()
    }

    /// Drain the outbox as bare texts.
    pub fn take_texts(&mut self, session: SessionId) -> Vec<String> {
        self.take(session).iter().map(|m| m.text().to_string()).collect()
    }

    /// Whether the driver has closed `session`.
    pub fn is_closed(&self, session: SessionId) -> bool {
        self.closed.contains(&session)
    }

    /// Whether the driver asked the runtime to stop.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Log actions executed so far.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// Events processed so far.
    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Get reference to the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        self.driver.registry()
    }

    /// Get reference to the authenticator.
    pub fn authenticator(&self) -> &MemoryAuthenticator {
        self.driver.authenticator()
    }

    /// Get reference to the transcript store.
    pub fn transcripts(&self) -> &T {
        self.driver.transcripts()
    }

    /// Get reference to the environment.
    pub fn env(&self) -> &SimEnv {
        self.driver.env()
    }

    /// Get reference to the wrapped driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv, MemoryAuthenticator, T> {
        &self.driver
    }

    /// Snapshot of the current registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::from_registry(self.driver.registry())
    }

    fn process(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let context = format!("after event #{} ({event:?})", self.events);
        self.events += 1;
        let actions = self.driver.process_event(event)?;
        self.execute(actions);
        self.check(&context);
        Ok(())
    }

    fn execute(&mut self, actions: Vec<ServerAction>) {
        for action in actions {
            match action {
                ServerAction::Send { session, message } => {
                    self.outboxes.entry(session).or_default().push(message);
                },
                ServerAction::Close { session, reason } => {
                    tracing::debug!(session = %session, "closing: {}", reason);
                    self.closed.insert(session);
                },
                ServerAction::Log { level, message } => {
                    match level {
                        LogLevel::Debug => tracing::debug!("{}", message),
                        LogLevel::Info => tracing::info!("{}", message),
                        LogLevel::Warn => tracing::warn!("{}", message),
                        LogLevel::Error => tracing::error!("{}", message),
                    }
                    self.logs.push((level, message));
                },
                ServerAction::Terminate => self.terminated = true,
            }
        }
    }

    fn check(&self, context: &str) {
        self.invariants.assert_all(&self.snapshot(), context);
    }
}
