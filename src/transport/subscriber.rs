//! # Fan-In Subscriber
//!
//! The receiving half of the fan-out publish/subscribe pair. A subscriber
//! binds a loopback TCP listener (ephemeral port unless one is given) and
//! accepts any number of publisher connections; frames from every connection
//! are merged into a single bounded channel in receipt order. There is no
//! acknowledgment and no cross-publisher ordering guarantee — arrival order
//! is receipt order when multiple publishers race.
//!
//! The accept loop and one reader task per connection run in the background
//! from the moment `bind` returns; `recv` only drains the merged channel.

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FabricError;
use crate::transport::frame;

/// Capacity of the merged inbound channel. Readers block (providing
/// backpressure to the socket) when the channel is full.
const MERGE_CHANNEL_CAPACITY: usize = 64;

/// Fan-in subscriber endpoint bound at a discoverable loopback port.
pub struct Subscriber {
  port: u16,
  rx: mpsc::Receiver<Bytes>,
  cancel: CancellationToken,
  closed: bool,
}

impl Subscriber {
  /// Binds the subscriber and starts accepting publisher connections.
  ///
  /// # Arguments
  ///
  /// * `port` - Explicit port to bind, or `None` for an ephemeral port.
  ///   The resolved port is available via [`Subscriber::port`].
  pub async fn bind(port: Option<u16>) -> Result<Self, FabricError> {
    let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0))).await?;
    let port = listener.local_addr()?.port();
    let (tx, rx) = mpsc::channel(MERGE_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    tokio::spawn(accept_loop(listener, tx, cancel.clone()));
    debug!(port, "subscriber bound");
    Ok(Self {
      port,
      rx,
      cancel,
      closed: false,
    })
  }

  /// Returns the bound inbound port.
  pub fn port(&self) -> u16 {
    self.port
  }

  /// Receives the next payload, waiting up to `poll_timeout`.
  ///
  /// # Returns
  ///
  /// `Ok(Some(payload))` when a frame arrived, `Ok(None)` when the timeout
  /// expired with nothing pending, `Err(ClosedEndpoint)` after `close`.
  pub async fn recv(&mut self, poll_timeout: Duration) -> Result<Option<Bytes>, FabricError> {
    if self.closed {
      return Err(FabricError::ClosedEndpoint);
    }
    match timeout(poll_timeout, self.rx.recv()).await {
      Ok(Some(payload)) => Ok(Some(payload)),
      Ok(None) => Err(FabricError::ClosedEndpoint),
      Err(_) => Ok(None),
    }
  }

  /// Non-blocking variant of [`Subscriber::recv`].
  ///
  /// # Errors
  ///
  /// `Empty` when no frame is pending.
  pub fn try_recv(&mut self) -> Result<Bytes, FabricError> {
    if self.closed {
      return Err(FabricError::ClosedEndpoint);
    }
    match self.rx.try_recv() {
      Ok(payload) => Ok(payload),
      Err(mpsc::error::TryRecvError::Empty) => Err(FabricError::Empty),
      Err(mpsc::error::TryRecvError::Disconnected) => Err(FabricError::ClosedEndpoint),
    }
  }

  /// Stops the accept loop, disconnects every publisher, and releases the
  /// listener. Subsequent `recv` calls fail with `ClosedEndpoint`.
  pub fn close(&mut self) {
    self.cancel.cancel();
    self.closed = true;
  }
}

impl Drop for Subscriber {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      accepted = listener.accept() => match accepted {
        Ok((stream, peer)) => {
          debug!(peer = %peer, "publisher connected");
          tokio::spawn(read_connection(stream, tx.clone(), cancel.clone()));
        }
        Err(e) => {
          warn!(error = %e, "error accepting publisher connection");
        }
      },
    }
  }
}

async fn read_connection(mut stream: TcpStream, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
  loop {
    let payload = tokio::select! {
      _ = cancel.cancelled() => break,
      read = frame::read_frame(&mut stream) => match read {
        Ok(payload) => payload,
        // Publisher went away or sent garbage; this connection is done.
        Err(_) => break,
      },
    };
    // A full merge channel blocks here, which in turn stops reading the
    // socket: inbound backpressure instead of dropping accepted frames.
    tokio::select! {
      _ = cancel.cancelled() => break,
      sent = tx.send(payload) => {
        if sent.is_err() {
          break;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::AsyncWriteExt;

  #[tokio::test]
  async fn test_recv_times_out_with_no_publisher() {
    let mut sub = Subscriber::bind(None).await.expect("bind");
    let got = sub.recv(Duration::from_millis(50)).await.expect("recv");
    assert!(got.is_none());
  }

  #[tokio::test]
  async fn test_merges_frames_from_multiple_connections() {
    let mut sub = Subscriber::bind(None).await.expect("bind");
    let port = sub.port();

    for text in ["from-a", "from-b"] {
      let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
      frame::write_frame(&mut stream, text.as_bytes()).await.expect("write");
      // Keep the connection open long enough for the reader to drain it.
      tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = stream.shutdown().await;
      });
    }

    let mut seen = Vec::new();
    for _ in 0..2 {
      let payload = sub
        .recv(Duration::from_secs(2))
        .await
        .expect("recv")
        .expect("payload");
      seen.push(String::from_utf8(payload.to_vec()).expect("utf8"));
    }
    seen.sort();
    assert_eq!(seen, vec!["from-a".to_string(), "from-b".to_string()]);
  }

  #[tokio::test]
  async fn test_recv_after_close_is_an_error() {
    let mut sub = Subscriber::bind(None).await.expect("bind");
    sub.close();
    let result = sub.recv(Duration::from_millis(10)).await;
    assert!(matches!(result, Err(FabricError::ClosedEndpoint)));
  }
}
