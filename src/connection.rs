use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use futures::FutureExt;
use thiserror::Error as ThisError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::reply::Reply;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("connection closed by peer")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Connection {
    pub id: Uuid,
    stream: TcpStream,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    codec: FrameCodec,
}

impl Connection {
    pub fn new(stream: TcpStream, max_frame_size: usize) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            stream,
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
            codec: FrameCodec::new(max_frame_size),
        }
    }

    pub async fn open(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        max_frame_size: usize,
    ) -> io::Result<Connection> {
        let connect = TcpStream::connect((host, port));
        let stream = match connect_timeout {
            Some(limit) => time::timeout(limit, connect)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Connection timed out"))??,
            None => connect.await?,
        };

        // Requests are tiny and the caller waits on each one, so they must not sit in Nagle's
        // buffer.
        stream.set_nodelay(true)?;

        Ok(Connection::new(stream, max_frame_size))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Reports whether the socket can take a write right now, without waiting for it.
    pub fn is_writable(&self) -> bool {
        matches!(self.stream.writable().now_or_never(), Some(Ok(())))
    }

    /// Drops every byte that is already buffered or waiting on the socket. Anything there belongs
    /// to an earlier request whose reply arrived after its timeout.
    pub fn discard_stale(&mut self) -> Result<usize, Error> {
        let mut discarded = self.buffer.len();
        self.buffer.clear();

        let mut scratch = [0u8; 4096];
        loop {
            match self.stream.try_read(&mut scratch) {
                Ok(0) => return Err(Error::Closed),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        if discarded > 0 {
            warn!(discarded, "discarded stale bytes left by an earlier request");
        }

        Ok(discarded)
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        let mut out = BytesMut::new();
        self.codec
            .encode(frame, &mut out)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        debug!(%frame, "sending request");

        self.stream.write_all(&out).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Reads until one complete reply is buffered. Bytes that can not be parsed as RESP are handed
    /// back untouched instead of failing the call.
    pub async fn read_reply(&mut self) -> Result<Reply, Error> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(frame)) => {
                    debug!(%frame, "received reply");
                    return Ok(Reply::Frame(frame));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "reply is not valid RESP, passing it through");
                    return Ok(Reply::Malformed(self.buffer.split().freeze()));
                }
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The peer closed the socket. Whatever arrived before that is all there is.
                if self.buffer.is_empty() {
                    return Err(Error::Closed);
                }
                return Ok(Reply::Malformed(self.buffer.split().freeze()));
            }
        }
    }
}
