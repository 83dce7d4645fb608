//! # Reliable Queue Consumer
//!
//! Consumer half of the reliable queue: accepts one item per request and
//! acknowledges it synchronously — the producer's signal to drop the item
//! from its retry buffer. Binds a discoverable port so producers on other
//! processes can be wired to it.

use std::marker::PhantomData;

use tokio::time::Duration;

use crate::error::FabricError;
use crate::message::Payload;
use crate::queue::MessageQueue;
use crate::transport::{Replier, frame};

/// Consumer half of the reliable queue, bound at a discoverable port.
pub struct QueueConsumer<M> {
  replier: Replier,
  _marker: PhantomData<fn() -> M>,
}

impl<M: Payload> QueueConsumer<M> {
  /// Binds the consumer at `port` (ephemeral when `None`) and starts
  /// accepting producer connections.
  pub async fn bind(port: Option<u16>) -> Result<Self, FabricError> {
    Ok(Self {
      replier: Replier::bind(port).await?,
      _marker: PhantomData,
    })
  }

  /// Returns the bound port producers connect to.
  pub fn port(&self) -> u16 {
    self.replier.port()
  }

  /// Waits up to `wait` for one item, acknowledges it, and returns it.
  /// `Ok(None)` means the timeout expired with nothing pending.
  pub async fn get(&mut self, wait: Duration) -> Result<Option<M>, FabricError> {
    match self.replier.recv(wait).await? {
      Some(payload) => Ok(Some(frame::decode(&payload)?)),
      None => Ok(None),
    }
  }

  /// Non-blocking dequeue.
  ///
  /// # Errors
  ///
  /// `Empty` when nothing is pending.
  pub fn get_nowait(&mut self) -> Result<M, FabricError> {
    let payload = self.replier.try_recv()?;
    frame::decode(&payload)
  }

  /// Stops accepting requests and releases the port.
  pub fn close(&mut self) {
    self.replier.close();
  }
}

#[async_trait::async_trait]
impl<M: Payload> MessageQueue<M> for QueueConsumer<M> {
  async fn put(&mut self, _item: M) -> Result<(), FabricError> {
    Err(FabricError::UnsupportedOperation(
      "QueueConsumer does not support put",
    ))
  }

  async fn put_nowait(&mut self, _item: M) -> Result<(), FabricError> {
    Err(FabricError::UnsupportedOperation(
      "QueueConsumer does not support put_nowait",
    ))
  }

  async fn get(&mut self, wait: Duration) -> Result<Option<M>, FabricError> {
    QueueConsumer::get(self, wait).await
  }

  fn get_nowait(&mut self) -> Result<M, FabricError> {
    QueueConsumer::get_nowait(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_get_nowait_empty() {
    let mut consumer: QueueConsumer<String> = QueueConsumer::bind(None).await.expect("bind");
    assert!(matches!(consumer.get_nowait(), Err(FabricError::Empty)));
  }

  #[tokio::test]
  async fn test_put_on_consumer_is_unsupported() {
    let mut consumer: QueueConsumer<String> = QueueConsumer::bind(None).await.expect("bind");
    let result = consumer.put("nope".to_string()).await;
    assert!(matches!(result, Err(FabricError::UnsupportedOperation(_))));
    let result = consumer.put_nowait("nope".to_string()).await;
    assert!(matches!(result, Err(FabricError::UnsupportedOperation(_))));
  }

  #[tokio::test]
  async fn test_get_times_out_without_producer() {
    let mut consumer: QueueConsumer<String> = QueueConsumer::bind(None).await.expect("bind");
    let got = consumer.get(Duration::from_millis(50)).await.expect("get");
    assert!(got.is_none());
  }
}
