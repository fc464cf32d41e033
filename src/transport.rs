//! TCP transport: one [`Session`] per connection and the server-side
//! [`Listener`].
//!
//! The wire format is unframed. Every read is a single-shot chunk of at
//! most [`CHUNK_SIZE`] bytes, and nothing guarantees that one chunk maps to
//! one application message: a response may arrive split across several
//! reads or merged with the next one. Callers must treat each chunk as an
//! opaque blob.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, trace};

use crate::error::RelayError;
use crate::interrupt::InterruptFlag;
use crate::Result;

/// Maximum size of a single transport read.
pub const CHUNK_SIZE: usize = 1024;

/// Pending-connection queue length for the listening socket.
pub const LISTEN_BACKLOG: u32 = 3;

/// Outcome of a single receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Bytes that arrived in one read.
    Data(Vec<u8>),
    /// The peer closed the connection (zero-length read).
    EndOfStream,
}

/// A live TCP connection to a peer.
#[derive(Debug)]
pub struct Session {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl Session {
    /// Connect to `addr`.
    pub async fn open(addr: SocketAddr) -> Result<Self> {
        debug!("Attempting to connect to {}", addr);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RelayError::Connect { addr, source })?;
        Ok(Self::from_stream(stream, addr))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream: Some(stream),
            peer,
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write every byte of `bytes`, retrying partial writes.
    pub async fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RelayError::SessionClosed)?;
        stream.write_all(bytes).await.map_err(RelayError::Send)?;
        trace!("sent {} bytes to {}", bytes.len(), self.peer);
        Ok(())
    }

    /// Perform one read of at most `max_size` bytes.
    pub async fn recv_chunk(&mut self, max_size: usize) -> Result<Received> {
        let stream = self.stream.as_mut().ok_or(RelayError::SessionClosed)?;
        let mut buf = vec![0u8; max_size];
        let n = stream.read(&mut buf).await.map_err(RelayError::Recv)?;
        if n == 0 {
            return Ok(Received::EndOfStream);
        }
        buf.truncate(n);
        trace!("received {} bytes from {}", n, self.peer);
        Ok(Received::Data(buf))
    }

    /// Release the connection. Calling this on a closed session does nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; the descriptor is released either way.
            let _ = stream.shutdown().await;
            debug!("Connection to {} closed", self.peer);
        }
    }
}

/// The server's listening endpoint.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind and listen on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        debug!("Socket created successfully");

        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        debug!("Socket bound to {}", addr);

        let inner = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Wait for the next connection.
    ///
    /// Returns `Ok(None)` when `interrupt` is set before or during the wait;
    /// that is a shutdown, not a failure.
    pub async fn accept(&self, interrupt: &InterruptFlag) -> Result<Option<Session>> {
        if interrupt.is_set() {
            return Ok(None);
        }

        tokio::select! {
            biased;
            _ = interrupt.wait() => Ok(None),
            accepted = self.inner.accept() => {
                let (stream, peer) = accepted.map_err(RelayError::Accept)?;
                debug!("Accepted connection from {}", peer);
                Ok(Some(Session::from_stream(stream, peer)))
            }
        }
    }
}
