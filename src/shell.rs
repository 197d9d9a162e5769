//! Line-oriented front end for a [`RedisLink`].
//!
//! Lines starting with `:` drive the connection, every other line is sent to the server as a
//! command. Replies are echoed as `> <command>` followed by the rendered reply, and connection
//! changes are announced as they are reported by the link.

use std::io;

use thiserror::Error as ThisError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::link::{LinkEvent, RedisLink};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;

const HELP: &str = "\
:connect [host] [port]  connect, or disconnect when already connected
:disconnect             close the connection
:status                 show the connection state
:help                   show this help
:quit                   leave the shell
<command> [args...]     send a command, e.g. PING or GET key";

#[derive(Debug, PartialEq, ThisError)]
pub enum ShellError {
    #[error("Invalid port: {0} (expected a number between 1 and 65535)")]
    InvalidPort(String),
    #[error("Unknown shell command: {0} (try :help)")]
    UnknownDirective(String),
}

#[derive(Debug, PartialEq)]
pub enum Input {
    Connect {
        host: Option<String>,
        port: Option<u16>,
    },
    Disconnect,
    Status,
    Help,
    Quit,
    Empty,
    Command(String),
}

impl TryFrom<&str> for Input {
    type Error = ShellError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Input::Empty);
        }

        if !line.starts_with(':') {
            return Ok(Input::Command(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let directive = parts.next().unwrap_or_default();

        match &directive.to_lowercase()[..] {
            ":connect" => {
                let host = parts.next().map(str::to_string);
                let port = parts.next().map(parse_port).transpose()?;
                Ok(Input::Connect { host, port })
            }
            ":disconnect" => Ok(Input::Disconnect),
            ":status" => Ok(Input::Status),
            ":help" => Ok(Input::Help),
            ":quit" | ":exit" => Ok(Input::Quit),
            _ => Err(ShellError::UnknownDirective(directive.to_string())),
        }
    }
}

/// Parses a port typed by the user. Zero and anything that is not a number are rejected instead
/// of being passed on to the socket.
pub fn parse_port(text: &str) -> Result<u16, ShellError> {
    match text.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ShellError::InvalidPort(text.to_string())),
    }
}

#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W> {
    link: RedisLink,
    events: UnboundedReceiver<LinkEvent>,
    host: String,
    port: u16,
    out: W,
}

impl<W: AsyncWrite + Unpin> Shell<W> {
    pub fn new(
        link: RedisLink,
        events: UnboundedReceiver<LinkEvent>,
        host: String,
        port: u16,
        out: W,
    ) -> Shell<W> {
        Shell {
            link,
            events,
            host,
            port,
            out,
        }
    }

    pub fn link(&self) -> &RedisLink {
        &self.link
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Connects to the current host and port.
    pub async fn connect(&mut self) -> io::Result<()> {
        self.link.connect(&self.host, self.port).await;
        self.report_events().await
    }

    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> crate::Result<()> {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            if self.handle_line(&line).await? == Flow::Quit {
                break;
            }
        }

        self.link.disconnect();
        self.report_events().await?;

        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let input = match Input::try_from(line) {
            Ok(input) => input,
            Err(err) => {
                self.print(&err.to_string()).await?;
                return Ok(Flow::Continue);
            }
        };

        match input {
            Input::Empty => self.print("Please enter a command").await?,
            Input::Help => self.print(HELP).await?,
            Input::Quit => return Ok(Flow::Quit),
            Input::Status => {
                let status = format!("{} ({}:{})", self.link.state(), self.host, self.port);
                self.print(&status).await?;
            }
            Input::Disconnect => self.link.disconnect(),
            Input::Connect { host, port } => {
                // Mirrors a connect/disconnect toggle button.
                if self.link.is_connected() {
                    self.link.disconnect();
                } else {
                    if let Some(host) = host {
                        self.host = host;
                    }
                    if let Some(port) = port {
                        self.port = port;
                    }
                    self.link.connect(&self.host, self.port).await;
                }
            }
            Input::Command(command) => {
                let response = self.link.execute(&command).await;
                self.print(&format!("> {}\n{}\n", command, response)).await?;
            }
        }

        self.report_events().await?;
        Ok(Flow::Continue)
    }

    async fn report_events(&mut self) -> io::Result<()> {
        while let Ok(event) = self.events.try_recv() {
            let text = match event {
                LinkEvent::StatusChanged(true) => "=== Connected to Redis ===\n".to_string(),
                LinkEvent::StatusChanged(false) => "=== Disconnected from Redis ===\n".to_string(),
                LinkEvent::Error(message) => format!("Connection error: {}\n", message),
            };
            self.print(&text).await?;
        }
        Ok(())
    }

    async fn print(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn shell() -> Shell<Vec<u8>> {
        let (link, events) = RedisLink::new(LinkConfig::default());
        Shell::new(link, events, DEFAULT_HOST.to_string(), DEFAULT_PORT, Vec::new())
    }

    #[test]
    fn parse_command_line() {
        assert_eq!(
            Input::try_from("  SET foo bar  "),
            Ok(Input::Command("SET foo bar".to_string()))
        );
    }

    #[test]
    fn parse_empty_line() {
        assert_eq!(Input::try_from(" \t "), Ok(Input::Empty));
    }

    #[test]
    fn parse_connect_directive() {
        assert_eq!(
            Input::try_from(":connect localhost 6380"),
            Ok(Input::Connect {
                host: Some("localhost".to_string()),
                port: Some(6380),
            })
        );
        assert_eq!(
            Input::try_from(":CONNECT"),
            Ok(Input::Connect {
                host: None,
                port: None
            })
        );
    }

    #[test]
    fn parse_connect_rejects_bad_port() {
        assert_eq!(
            Input::try_from(":connect localhost redis"),
            Err(ShellError::InvalidPort("redis".to_string()))
        );
    }

    #[test]
    fn parse_unknown_directive() {
        assert_eq!(
            Input::try_from(":frobnicate"),
            Err(ShellError::UnknownDirective(":frobnicate".to_string()))
        );
    }

    #[test]
    fn port_validation() {
        assert_eq!(parse_port("6379"), Ok(6379));
        assert_eq!(parse_port("65535"), Ok(65535));
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-1").is_err());
        assert!(parse_port("").is_err());
    }

    #[tokio::test]
    async fn empty_line_asks_for_a_command() {
        let mut shell = shell();

        let flow = shell.handle_line("   ").await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            String::from_utf8(shell.into_output()).unwrap(),
            "Please enter a command\n"
        );
    }

    #[tokio::test]
    async fn command_while_disconnected() {
        let mut shell = shell();

        shell.handle_line("PING").await.unwrap();

        assert_eq!(
            String::from_utf8(shell.into_output()).unwrap(),
            "> PING\nError: Not connected to Redis\n\n"
        );
    }

    #[tokio::test]
    async fn status_reports_state_and_target() {
        let mut shell = shell();

        shell.handle_line(":status").await.unwrap();

        assert_eq!(
            String::from_utf8(shell.into_output()).unwrap(),
            "Disconnected (127.0.0.1:6379)\n"
        );
    }

    #[tokio::test]
    async fn connect_toggle_and_command_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let n = socket.read(&mut request).await.unwrap();
            assert_eq!(&request[..n], b"*1\r\n$4\r\nPING\r\n");
            socket.write_all(b"+PONG\r\n").await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        // Nothing listens on this port once the listener is dropped.
        let dead_port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut shell = shell();
        shell
            .handle_line(&format!(":connect 127.0.0.1 {}", port))
            .await
            .unwrap();
        assert!(shell.link().is_connected());

        shell.handle_line("PING").await.unwrap();

        // Already connected, so this disconnects.
        shell.handle_line(":connect").await.unwrap();
        assert!(!shell.link().is_connected());

        shell
            .handle_line(&format!(":connect 127.0.0.1 {}", dead_port))
            .await
            .unwrap();
        assert!(!shell.link().is_connected());

        let output = String::from_utf8(shell.into_output()).unwrap();
        let expected_head = "=== Connected to Redis ===\n\n\
                             > PING\nPONG\n\n\
                             === Disconnected from Redis ===\n\n\
                             Connection error: ";
        assert!(output.starts_with(expected_head), "got {:?}", output);
        assert!(
            output.ends_with("\n\n=== Disconnected from Redis ===\n\n"),
            "got {:?}",
            output
        );
        assert_eq!(output.matches("Connection error: ").count(), 1);
    }

    #[tokio::test]
    async fn quit_stops_the_loop() {
        let mut shell = shell();

        assert_eq!(shell.handle_line(":quit").await.unwrap(), Flow::Quit);
    }
}
