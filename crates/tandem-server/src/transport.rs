//! TCP transport with newline framing.
//!
//! Each accepted stream is split in two. The read half is wrapped in a
//! [`LinesCodec`] capped at [`MAX_LINE_LENGTH`] and pumped into the event
//! channel; the write half drains a bounded queue of already-encoded
//! messages. Dropping the queue's sender lets the writer flush what is left
//! and shut the socket.
//!
//! A line longer than the cap, invalid UTF-8, or any read error ends the
//! connection exactly like the peer hanging up.

use std::net::SocketAddr;

use futures::StreamExt;
use tandem_core::SessionId;
use tandem_proto::MAX_LINE_LENGTH;
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::error::ServerError;

/// Listening TCP socket.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to `address` (e.g. `0.0.0.0:9090`, or port 0 for an ephemeral port).
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("TCP transport bound to {}", listener.local_addr()?);

        Ok(Self { listener })
    }

    /// Wait for the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// What a reader task reports back.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// One line, delimiter stripped
    Line(SessionId, String),
    /// The read side ended
    Closed(SessionId, String),
}

/// Read lines until EOF or error, then report the close. Never reports
/// anything after `Closed`.
pub(crate) async fn read_lines<F>(session: SessionId, read_half: OwnedReadHalf, mut report: F)
where
    F: FnMut(Inbound) -> bool,
{
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let reason = loop {
        match lines.next().await {
            Some(Ok(line)) => {
                if !report(Inbound::Line(session, line)) {
                    return;
                }
            },
            Some(Err(e)) => break format!("read failed: {e}"),
            None => break "connection closed by peer".to_string(),
        }
    };

    report(Inbound::Closed(session, reason));
}

/// Write queued messages in order until the queue closes, then shut down the
/// write side.
pub(crate) async fn write_lines(
    session: SessionId,
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::Receiver<String>,
) {
    while let Some(text) = queue.recv().await {
        if let Err(e) = write_half.write_all(text.as_bytes()).await {
            tracing::debug!(session = %session, error = %e, "write failed");
            return;
        }
    }

    if let Err(e) = write_half.shutdown().await {
        tracing::debug!(session = %session, error = %e, "shutdown failed");
    }
}
