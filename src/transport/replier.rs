//! # Synchronous Replier
//!
//! The answering half of the request/reply pair. The replier binds a
//! loopback listener and serves any number of requesters; each connection
//! task reads one frame at a time and parks it, together with a one-shot
//! reply slot, on a bounded channel. Nothing is acknowledged until the
//! owner calls [`Replier::recv`] — the acknowledgment is what lets the
//! requester remove the item from its retry buffer, so it must mean
//! "consumed", not "buffered".
//!
//! While a request waits to be consumed, its connection task watches the
//! socket: a requester that times out and tears down its connection
//! abandons the pending entry, and `recv` skips such stale entries instead
//! of handing the same logical item over twice after the retry lands.

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FabricError;
use crate::transport::frame;

/// Minimal acknowledgment body sent back for every consumed request.
const ACK: &[u8] = b"0";

/// Pending requests parked ahead of consumption. Kept small: requesters
/// are single-in-flight, so depth tracks the number of live requesters.
const PENDING_CHANNEL_CAPACITY: usize = 64;

/// Replier endpoint bound at a discoverable loopback port.
pub struct Replier {
  port: u16,
  rx: mpsc::Receiver<(Bytes, oneshot::Sender<Bytes>)>,
  cancel: CancellationToken,
  closed: bool,
}

impl Replier {
  /// Binds the replier and starts serving requester connections.
  ///
  /// # Arguments
  ///
  /// * `port` - Explicit port to bind, or `None` for an ephemeral port.
  pub async fn bind(port: Option<u16>) -> Result<Self, FabricError> {
    let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0))).await?;
    let port = listener.local_addr()?.port();
    let (tx, rx) = mpsc::channel(PENDING_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    tokio::spawn(accept_loop(listener, tx, cancel.clone()));
    debug!(port, "replier bound");
    Ok(Self {
      port,
      rx,
      cancel,
      closed: false,
    })
  }

  /// Returns the bound port.
  pub fn port(&self) -> u16 {
    self.port
  }

  /// Waits up to `wait` for one request, acknowledges it, and returns the
  /// payload. `Ok(None)` means the timeout expired with nothing pending.
  pub async fn recv(&mut self, wait: Duration) -> Result<Option<Bytes>, FabricError> {
    if self.closed {
      return Err(FabricError::ClosedEndpoint);
    }
    let deadline = Instant::now() + wait;
    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return Ok(None);
      }
      match timeout(remaining, self.rx.recv()).await {
        Ok(Some((payload, ack))) => {
          if ack.send(Bytes::from_static(ACK)).is_ok() {
            return Ok(Some(payload));
          }
          // Abandoned attempt from a torn-down requester; keep draining.
        }
        Ok(None) => return Err(FabricError::ClosedEndpoint),
        Err(_) => return Ok(None),
      }
    }
  }

  /// Non-blocking variant of [`Replier::recv`].
  ///
  /// # Errors
  ///
  /// `Empty` when no request is pending.
  pub fn try_recv(&mut self) -> Result<Bytes, FabricError> {
    if self.closed {
      return Err(FabricError::ClosedEndpoint);
    }
    loop {
      match self.rx.try_recv() {
        Ok((payload, ack)) => {
          if ack.send(Bytes::from_static(ACK)).is_ok() {
            return Ok(payload);
          }
        }
        Err(mpsc::error::TryRecvError::Empty) => return Err(FabricError::Empty),
        Err(mpsc::error::TryRecvError::Disconnected) => return Err(FabricError::ClosedEndpoint),
      }
    }
  }

  /// Stops serving, disconnects every requester, and releases the listener.
  pub fn close(&mut self) {
    self.cancel.cancel();
    self.closed = true;
  }
}

impl Drop for Replier {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

async fn accept_loop(
  listener: TcpListener,
  tx: mpsc::Sender<(Bytes, oneshot::Sender<Bytes>)>,
  cancel: CancellationToken,
) {
  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      accepted = listener.accept() => match accepted {
        Ok((stream, peer)) => {
          debug!(peer = %peer, "requester connected");
          tokio::spawn(serve_connection(stream, tx.clone(), cancel.clone()));
        }
        Err(e) => {
          warn!(error = %e, "error accepting requester connection");
        }
      },
    }
  }
}

async fn serve_connection(
  stream: TcpStream,
  tx: mpsc::Sender<(Bytes, oneshot::Sender<Bytes>)>,
  cancel: CancellationToken,
) {
  let (mut read_half, mut write_half) = stream.into_split();
  loop {
    let payload = tokio::select! {
      _ = cancel.cancelled() => break,
      read = frame::read_frame(&mut read_half) => match read {
        Ok(payload) => payload,
        Err(_) => break,
      },
    };
    let (ack_tx, mut ack_rx) = oneshot::channel();
    if tx.send((payload, ack_tx)).await.is_err() {
      break;
    }
    // Requesters are single-in-flight: nothing else arrives on this
    // connection until the reply goes out, so any read activity here means
    // the peer tore the connection down. Dropping ack_rx marks the parked
    // entry stale. Biased polling: an already-granted acknowledgment must
    // reach the wire even when shutdown fires in the same instant.
    let mut probe = [0u8; 1];
    tokio::select! {
      biased;
      reply = &mut ack_rx => match reply {
        Ok(reply) => {
          if frame::write_frame(&mut write_half, &reply).await.is_err() {
            break;
          }
        }
        Err(_) => break,
      },
      _ = cancel.cancelled() => break,
      _ = read_half.read(&mut probe) => break,
    }
  }
}
