//! # Synchronous Requester
//!
//! The asking half of the request/reply pair: one request in flight,
//! blocking up to a caller-supplied timeout for the reply. On timeout or
//! I/O failure the connection is discarded — a half-exchanged stream cannot
//! be reused for framing — and the caller owns the reconnect decision (the
//! next request dials fresh, or [`Requester::reset`] forces it explicitly).

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

use crate::error::FabricError;
use crate::transport::frame;

/// Single-in-flight requester endpoint targeting one replier port.
pub struct Requester {
  port: u16,
  stream: Option<TcpStream>,
  closed: bool,
}

impl Requester {
  /// Creates a requester for the given replier port. The connection is
  /// established lazily on the first request.
  pub fn connect(port: u16) -> Self {
    Self {
      port,
      stream: None,
      closed: false,
    }
  }

  /// Returns the targeted replier port.
  pub fn port(&self) -> u16 {
    self.port
  }

  /// Sends one payload and waits up to `wait` for the reply.
  ///
  /// # Errors
  ///
  /// `Timeout` when the bounded wait expires — the peer must be assumed
  /// unreachable; `Io` when connecting or exchanging fails outright. In
  /// both cases the connection is dropped so the next attempt starts from
  /// a fresh requester identity.
  pub async fn request(&mut self, payload: &Bytes, wait: Duration) -> Result<Bytes, FabricError> {
    if self.closed {
      return Err(FabricError::ClosedEndpoint);
    }
    match timeout(wait, self.exchange(payload)).await {
      Ok(Ok(reply)) => Ok(reply),
      Ok(Err(e)) => {
        self.stream = None;
        Err(e)
      }
      Err(_) => {
        self.stream = None;
        Err(FabricError::Timeout(wait))
      }
    }
  }

  async fn exchange(&mut self, payload: &Bytes) -> Result<Bytes, FabricError> {
    if self.stream.is_none() {
      let conn = TcpStream::connect(("127.0.0.1", self.port)).await?;
      conn.set_nodelay(true)?;
      self.stream = Some(conn);
    }
    let Some(stream) = self.stream.as_mut() else {
      return Err(FabricError::ClosedEndpoint);
    };
    frame::write_frame(stream, payload).await?;
    frame::read_frame(stream).await
  }

  /// Discards the current connection so the next request dials fresh.
  pub fn reset(&mut self) {
    self.stream = None;
  }

  /// Drops the connection and marks the endpoint closed.
  pub fn close(&mut self) {
    self.stream = None;
    self.closed = true;
  }
}
