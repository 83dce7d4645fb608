//! Best-effort pub/sub queue looped through one port.
//!
//! A subscriber bound at a port with a publisher dialed back into it: a
//! same-host handoff queue with fire-and-forget semantics. Anything put
//! before the internal connection is up, or while the inbound channel is
//! being torn down, is dropped — use the reliable producer/consumer pair
//! when loss matters.

use std::marker::PhantomData;

use tokio::time::Duration;

use crate::error::FabricError;
use crate::message::Payload;
use crate::queue::MessageQueue;
use crate::transport::{Publisher, Subscriber, frame};

/// Loopback publish/subscribe queue.
pub struct PubSubQueue<M> {
  subscriber: Subscriber,
  publisher: Publisher,
  _marker: PhantomData<fn(M) -> M>,
}

impl<M: Payload> PubSubQueue<M> {
  /// Binds the queue at `port` (ephemeral when `None`).
  pub async fn bind(port: Option<u16>) -> Result<Self, FabricError> {
    let subscriber = Subscriber::bind(port).await?;
    let publisher = Publisher::connect(subscriber.port());
    Ok(Self {
      subscriber,
      publisher,
      _marker: PhantomData,
    })
  }

  /// Returns the looped port. Other processes may publish into it too.
  pub fn port(&self) -> u16 {
    self.subscriber.port()
  }

  /// Publishes one item, fire-and-forget.
  pub async fn put(&mut self, item: M) -> Result<(), FabricError> {
    let payload = frame::encode(&item)?;
    self.publisher.send(&payload).await
  }

  /// Receives one item, waiting up to `wait`.
  pub async fn get(&mut self, wait: Duration) -> Result<Option<M>, FabricError> {
    match self.subscriber.recv(wait).await? {
      Some(payload) => Ok(Some(frame::decode(&payload)?)),
      None => Ok(None),
    }
  }

  /// Non-blocking receive; `Empty` when nothing is pending.
  pub fn get_nowait(&mut self) -> Result<M, FabricError> {
    let payload = self.subscriber.try_recv()?;
    frame::decode(&payload)
  }

  /// Closes both halves and releases the port.
  pub async fn stop(&mut self) {
    self.publisher.close().await;
    self.subscriber.close();
  }
}

#[async_trait::async_trait]
impl<M: Payload> MessageQueue<M> for PubSubQueue<M> {
  async fn put(&mut self, item: M) -> Result<(), FabricError> {
    PubSubQueue::put(self, item).await
  }

  async fn put_nowait(&mut self, item: M) -> Result<(), FabricError> {
    // Publishing never blocks beyond the connect window; the blocking and
    // non-blocking paths coincide on this queue.
    PubSubQueue::put(self, item).await
  }

  async fn get(&mut self, wait: Duration) -> Result<Option<M>, FabricError> {
    PubSubQueue::get(self, wait).await
  }

  fn get_nowait(&mut self) -> Result<M, FabricError> {
    PubSubQueue::get_nowait(self)
  }
}
