use std::io;
use std::time::Duration;

use strum_macros::Display;
use thiserror::Error as ThisError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LinkConfig;
use crate::connection::{self, Connection};
use crate::frame::Frame;
use crate::reply::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Notifications about the link, delivered in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    StatusChanged(bool),
    Error(String),
}

/// Why a request produced no reply. The messages are the ones shown to the user after an
/// `Error: ` prefix.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ExecuteError {
    #[error("Not connected to Redis")]
    NotConnected,
    #[error("Socket not writable")]
    SocketNotWritable,
    #[error("Timeout waiting for response")]
    Timeout,
    #[error("Empty response")]
    EmptyResponse,
    #[error("{0}")]
    Transport(String),
}

/// A single Redis connection that runs one command at a time.
///
/// Connection state only changes through connect, disconnect, a peer close or a transport error,
/// and every change is reported on the event channel returned by [`RedisLink::new`].
pub struct RedisLink {
    config: LinkConfig,
    connection: Option<Connection>,
    events: UnboundedSender<LinkEvent>,
}

impl RedisLink {
    pub fn new(config: LinkConfig) -> (RedisLink, UnboundedReceiver<LinkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let link = RedisLink {
            config,
            connection: None,
            events,
        };
        (link, rx)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        match self.connection {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens the connection. The outcome is only reported through events. Does nothing while
    /// already connected.
    #[instrument(name = "connection", skip(self), fields(connection_id))]
    pub async fn connect(&mut self, host: &str, port: u16) {
        if self.is_connected() {
            debug!(host, port, "already connected, ignoring connect");
            return;
        }

        match Connection::open(
            host,
            port,
            self.config.connect_timeout,
            self.config.max_frame_size,
        )
        .await
        {
            Ok(conn) => {
                tracing::Span::current().record("connection_id", conn.id.to_string());
                info!(peer = ?conn.peer_addr().ok(), "Connected to Redis");
                self.connection = Some(conn);
                self.emit(LinkEvent::StatusChanged(true));
            }
            Err(err) => self.on_transport_error(err),
        }
    }

    /// Closes the socket if one is open.
    #[instrument(name = "connection", skip(self), fields(connection_id))]
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::Span::current().record("connection_id", conn.id.to_string());
            info!("closing connection");
            drop(conn);
            self.on_disconnected();
        }
    }

    /// Runs one command line and returns display-ready text. Failures come back as text prefixed
    /// with `Error: `.
    pub async fn execute(&mut self, command_line: &str) -> String {
        match self.request(command_line).await {
            Ok(reply) => reply.render(),
            Err(err) => format!("Error: {}", err),
        }
    }

    /// Sends one command line and waits for its reply.
    #[instrument(name = "connection", skip(self, command_line), fields(connection_id))]
    pub async fn request(&mut self, command_line: &str) -> Result<Reply, ExecuteError> {
        let response_timeout = self.config.response_timeout;
        let conn = self
            .connection
            .as_mut()
            .ok_or(ExecuteError::NotConnected)?;

        tracing::Span::current().record("connection_id", conn.id.to_string());

        if !conn.is_writable() {
            return Err(ExecuteError::SocketNotWritable);
        }

        let frame = Frame::command(command_line);
        match round_trip(conn, &frame, response_timeout).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => {
                warn!(
                    timeout_ms = response_timeout.as_millis() as u64,
                    "no reply before the timeout"
                );
                Err(ExecuteError::Timeout)
            }
            Err(connection::Error::Closed) => {
                self.connection = None;
                self.on_disconnected();
                Err(ExecuteError::EmptyResponse)
            }
            Err(connection::Error::Io(err)) => {
                let message = err.to_string();
                self.on_transport_error(err);
                Err(ExecuteError::Transport(message))
            }
        }
    }

    fn on_disconnected(&mut self) {
        info!("Disconnected from Redis");
        self.emit(LinkEvent::StatusChanged(false));
    }

    fn on_transport_error(&mut self, err: io::Error) {
        error!(error = %err, "Redis connection error");
        self.connection = None;
        self.emit(LinkEvent::Error(err.to_string()));
        self.emit(LinkEvent::StatusChanged(false));
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self
            .events
            .send(event)
            .map_err(|e| debug!("No one is listening for link events: {:?}", e.0));
    }
}

// Stale bytes are dropped first so the reply read afterwards belongs to this request. `None`
// means the timeout elapsed; the connection stays open in that case.
async fn round_trip(
    conn: &mut Connection,
    frame: &Frame,
    response_timeout: Duration,
) -> Result<Option<Reply>, connection::Error> {
    conn.discard_stale()?;
    conn.write_frame(frame).await?;

    match time::timeout(response_timeout, conn.read_reply()).await {
        Ok(reply) => reply.map(Some),
        Err(_elapsed) => Ok(None),
    }
}
