//! # Fan-Out Publisher
//!
//! The sending half of the publish/subscribe pair. A publisher targets one
//! subscriber's inbound port and delivers frames fire-and-forget: `send`
//! returns as soon as the payload is handed to the transport, and a peer
//! that is not yet listening (slow joiner) or a failed write means the
//! payload is silently dropped. The connection is re-dialed lazily on the
//! next send after any failure.
//!
//! `send` takes `&self` so a mailbox can fan one message across its whole
//! publisher set while the set itself is guarded by an outer lock.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tracing::{debug, trace};

use crate::error::FabricError;
use crate::transport::frame;

/// How long a send waits for the subscriber to accept the connection
/// before treating it as a slow joiner and dropping the payload.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Fire-and-forget publisher endpoint targeting one subscriber port.
pub struct Publisher {
  port: u16,
  stream: Mutex<Option<TcpStream>>,
  closed: AtomicBool,
}

impl Publisher {
  /// Creates a publisher for the given subscriber port. No I/O happens
  /// here; the connection is established lazily on the first send.
  pub fn connect(port: u16) -> Self {
    Self {
      port,
      stream: Mutex::new(None),
      closed: AtomicBool::new(false),
    }
  }

  /// Returns the targeted subscriber port.
  pub fn port(&self) -> u16 {
    self.port
  }

  /// Publishes one payload, best-effort.
  ///
  /// An unreachable or slow-joining subscriber and a failed write both
  /// result in the payload being dropped without error; only use after
  /// `close` is reported as a failure.
  pub async fn send(&self, payload: &Bytes) -> Result<(), FabricError> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(FabricError::ClosedEndpoint);
    }
    let mut stream = self.stream.lock().await;
    if stream.is_none() {
      match timeout(CONNECT_TIMEOUT, TcpStream::connect(("127.0.0.1", self.port))).await {
        Ok(Ok(conn)) => {
          conn.set_nodelay(true)?;
          debug!(port = self.port, "publisher connected");
          *stream = Some(conn);
        }
        Ok(Err(e)) => {
          trace!(port = self.port, error = %e, "no subscriber yet, dropping payload");
          return Ok(());
        }
        Err(_) => {
          trace!(port = self.port, "connect timed out, dropping payload");
          return Ok(());
        }
      }
    }
    if let Some(conn) = stream.as_mut() {
      if let Err(e) = frame::write_frame(conn, payload).await {
        debug!(port = self.port, error = %e, "publish failed, dropping payload");
        *stream = None;
      }
    }
    Ok(())
  }

  /// Shuts the connection down and marks the endpoint closed.
  pub async fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
    let mut stream = self.stream.lock().await;
    if let Some(mut conn) = stream.take() {
      let _ = conn.shutdown().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::subscriber::Subscriber;

  #[tokio::test]
  async fn test_send_without_subscriber_is_a_silent_drop() {
    // Nothing is listening on this port; send must neither error nor block.
    let publisher = Publisher::connect(1);
    publisher.send(&Bytes::from_static(b"lost")).await.expect("send");
  }

  #[tokio::test]
  async fn test_send_reaches_a_live_subscriber() {
    let mut sub = Subscriber::bind(None).await.expect("bind");
    let publisher = Publisher::connect(sub.port());
    publisher.send(&Bytes::from_static(b"delivered")).await.expect("send");
    let payload = sub
      .recv(Duration::from_secs(2))
      .await
      .expect("recv")
      .expect("payload");
    assert_eq!(&payload[..], b"delivered");
  }

  #[tokio::test]
  async fn test_send_after_close_is_an_error() {
    let publisher = Publisher::connect(1);
    publisher.close().await;
    let result = publisher.send(&Bytes::from_static(b"x")).await;
    assert!(matches!(result, Err(FabricError::ClosedEndpoint)));
  }
}
