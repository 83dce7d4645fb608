//! # Mailbox
//!
//! The per-node communication endpoint. A mailbox owns exactly one inbound
//! fan-in subscriber — bound at a discoverable port, its identity — and a
//! dynamic set of outbound fan-out publishers, one per wired downstream
//! node. Nodes see a single `send`/`receive` contract; the merging of many
//! inbound publishers into one ordered inbox and the fanning of one
//! outbound message to many subscribers happen here.
//!
//! Mailboxes are live the instant they are created: construction binds the
//! inbound port and starts the background receiver loop, which polls the
//! subscriber and pushes into a bounded local inbox. A full inbox blocks
//! the receiver loop (backpressure) — a message accepted off the wire is
//! never dropped.
//!
//! The outbound publisher set is the only state mutated outside the hot
//! path. `add_publisher`/`remove_publisher` expect a single writer (the
//! topology builder wires everything before steady state) but are safe
//! relative to concurrent `send`: the map is guarded so a send never
//! observes a half-updated set.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FabricError;
use crate::message::Payload;
use crate::transport::{Publisher, Subscriber, frame};

/// Default capacity of the local inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 20;

/// Poll timeout for the receiver loop and for `receive`. Bounds idle CPU
/// use and worst-case stop latency.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// How long `stop` waits for the receiver loop to wind down.
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Capability set of a mailbox: what a node runtime needs from its
/// communication endpoint. [`Mailbox`] is the wire-backed implementation;
/// tests may drive runtimes against stubs.
#[async_trait]
pub trait MailboxLike<M>: Send {
  /// Fans one message to every wired downstream subscriber, best-effort.
  async fn send(&self, message: &M) -> Result<(), FabricError>;

  /// Pops the next inbound message, or `None` when nothing arrived within
  /// the poll window. `None` means "no data yet", not failure.
  async fn receive(&mut self) -> Option<M>;

  /// Halts the receiver loop and closes every endpoint. Idempotent.
  async fn stop(&mut self);
}

/// Wire-backed mailbox: one inbound subscriber, many outbound publishers.
pub struct Mailbox<M> {
  name: String,
  inbound_port: u16,
  publishers: Arc<RwLock<HashMap<u16, Publisher>>>,
  inbox: mpsc::Receiver<M>,
  cancel: CancellationToken,
  receiver_task: Option<JoinHandle<()>>,
  poll_timeout: Duration,
}

impl<M: Payload> Mailbox<M> {
  /// Creates a live mailbox with the default inbox capacity. The inbound
  /// port is self-allocated and immutable for the mailbox's lifetime.
  pub async fn new(name: impl Into<String>) -> Result<Self, FabricError> {
    Self::with_capacity(name, DEFAULT_INBOX_CAPACITY).await
  }

  /// Creates a live mailbox with an explicit inbox capacity.
  pub async fn with_capacity(
    name: impl Into<String>,
    capacity: usize,
  ) -> Result<Self, FabricError> {
    let name = name.into();
    let subscriber = Subscriber::bind(None).await?;
    let inbound_port = subscriber.port();
    let (tx, inbox) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    let receiver_task = tokio::spawn(receiver_loop(
      name.clone(),
      subscriber,
      tx,
      cancel.clone(),
      DEFAULT_POLL_TIMEOUT,
    ));
    debug!(mailbox = %name, port = inbound_port, "mailbox live");
    Ok(Self {
      name,
      inbound_port,
      publishers: Arc::new(RwLock::new(HashMap::new())),
      inbox,
      cancel,
      receiver_task: Some(receiver_task),
      poll_timeout: DEFAULT_POLL_TIMEOUT,
    })
  }

  /// Returns the mailbox name (normally the owning node id).
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the inbound port other mailboxes publish to.
  pub fn inbound_port(&self) -> u16 {
    self.inbound_port
  }

  /// Returns the currently wired downstream ports.
  pub async fn publisher_ports(&self) -> Vec<u16> {
    self.publishers.read().await.keys().copied().collect()
  }

  /// Wires a publisher to a downstream mailbox's inbound port.
  ///
  /// Not safe to call concurrently with other wiring calls (single-writer:
  /// the topology builder), but safe relative to concurrent `send`.
  pub async fn add_publisher(&self, port: u16) {
    self
      .publishers
      .write()
      .await
      .insert(port, Publisher::connect(port));
    debug!(mailbox = %self.name, port, "added publisher");
  }

  /// Unwires and closes the publisher for the given port, if present.
  pub async fn remove_publisher(&self, port: u16) {
    let removed = self.publishers.write().await.remove(&port);
    if let Some(publisher) = removed {
      publisher.close().await;
      debug!(mailbox = %self.name, port, "removed publisher");
    }
  }

  /// Fans one message to every wired publisher. Serializes once; delivery
  /// is best-effort with no ordering guarantee across subscribers.
  pub async fn send(&self, message: &M) -> Result<(), FabricError> {
    let payload = frame::encode(message)?;
    let publishers = self.publishers.read().await;
    for publisher in publishers.values() {
      publisher.send(&payload).await?;
    }
    Ok(())
  }

  /// Pops the next inbound message, waiting up to the poll timeout.
  /// Returns `None` when nothing is available — callers distinguish "no
  /// data yet" from failure by this sentinel.
  pub async fn receive(&mut self) -> Option<M> {
    match timeout(self.poll_timeout, self.inbox.recv()).await {
      Ok(message) => message,
      Err(_) => None,
    }
  }

  /// Halts the receiver loop, closes the inbound subscriber, and closes
  /// every outbound publisher. Idempotent; `send`/`receive` must not be
  /// called afterwards.
  pub async fn stop(&mut self) {
    self.cancel.cancel();
    if let Some(task) = self.receiver_task.take() {
      if timeout(JOIN_TIMEOUT, task).await.is_err() {
        warn!(mailbox = %self.name, "receiver loop did not stop within the join timeout");
      }
    }
    let mut publishers = self.publishers.write().await;
    for (_, publisher) in publishers.drain() {
      publisher.close().await;
    }
    info!(mailbox = %self.name, "mailbox stopped");
  }
}

async fn receiver_loop<M: Payload>(
  name: String,
  mut subscriber: Subscriber,
  tx: mpsc::Sender<M>,
  cancel: CancellationToken,
  poll_timeout: Duration,
) {
  loop {
    let received = tokio::select! {
      _ = cancel.cancelled() => break,
      received = subscriber.recv(poll_timeout) => received,
    };
    match received {
      Ok(Some(payload)) => match frame::decode::<M>(&payload) {
        Ok(message) => {
          // Blocks while the inbox is full: inbound backpressure instead
          // of dropping a message already accepted off the wire.
          tokio::select! {
            _ = cancel.cancelled() => break,
            pushed = tx.send(message) => {
              if pushed.is_err() {
                break;
              }
            }
          }
        }
        Err(e) => {
          warn!(mailbox = %name, error = %e, "discarding undecodable message");
        }
      },
      Ok(None) => continue,
      Err(_) => break,
    }
  }
  subscriber.close();
}

#[async_trait]
impl<M: Payload + Sync> MailboxLike<M> for Mailbox<M> {
  async fn send(&self, message: &M) -> Result<(), FabricError> {
    Mailbox::send(self, message).await
  }

  async fn receive(&mut self) -> Option<M> {
    Mailbox::receive(self).await
  }

  async fn stop(&mut self) {
    Mailbox::stop(self).await;
  }
}
