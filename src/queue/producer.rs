//! # Reliable Queue Producer
//!
//! Buffered, retrying enqueue built on the request/reply exchange. Items
//! are serialized into a bounded FIFO of not-yet-acknowledged payloads; the
//! drain loop requests the head item with a fixed per-attempt timeout and,
//! on failure, tears the connection down and retries the *same* head on a
//! fresh requester identity. The buffer is strictly ordered: the oldest
//! un-acknowledged item is always the next one attempted, and nothing is
//! reordered or silently evicted.
//!
//! The cost of this discipline is head-of-line blocking and a single item
//! in flight — accepted, because the per-item acknowledgment is what turns
//! transient peer unavailability into a deterministic timeout instead of a
//! silent drop.

use std::collections::VecDeque;
use std::marker::PhantomData;

use bytes::Bytes;
use tokio::time::{Duration, Instant, sleep};
use tracing::debug;

use crate::error::FabricError;
use crate::message::Payload;
use crate::queue::MessageQueue;
use crate::transport::{Requester, frame};

/// Default capacity of the un-acknowledged item buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Default per-attempt request timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Producer half of the reliable queue, wired to one consumer port.
pub struct QueueProducer<M> {
  requester: Requester,
  buffer: VecDeque<Bytes>,
  capacity: usize,
  attempt_timeout: Duration,
  _marker: PhantomData<fn(M)>,
}

impl<M: Payload> QueueProducer<M> {
  /// Creates a producer targeting the consumer bound at `port`.
  pub fn connect(port: u16) -> Self {
    Self {
      requester: Requester::connect(port),
      buffer: VecDeque::new(),
      capacity: DEFAULT_BUFFER_CAPACITY,
      attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
      _marker: PhantomData,
    }
  }

  /// Sets the buffer capacity.
  #[must_use]
  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the per-attempt request timeout.
  #[must_use]
  pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
    self.attempt_timeout = timeout;
    self
  }

  /// Returns the targeted consumer port.
  pub fn port(&self) -> u16 {
    self.requester.port()
  }

  /// Number of items buffered and not yet acknowledged.
  pub fn buffered(&self) -> usize {
    self.buffer.len()
  }

  /// Enqueues one item and drains the buffer, retrying indefinitely until
  /// every buffered item has been acknowledged by the consumer.
  pub async fn put(&mut self, item: M) -> Result<(), FabricError> {
    let payload = frame::encode(&item)?;
    if self.buffer.len() >= self.capacity {
      self.drain(None).await?;
    }
    self.buffer.push_back(payload);
    self.drain(None).await
  }

  /// Like [`QueueProducer::put`], but gives up once `limit` has elapsed.
  ///
  /// # Errors
  ///
  /// `Timeout` when the deadline passes with items still buffered; the
  /// buffer is left intact for a later drain.
  pub async fn put_timeout(&mut self, item: M, limit: Duration) -> Result<(), FabricError> {
    let deadline = Instant::now() + limit;
    let payload = frame::encode(&item)?;
    if self.buffer.len() >= self.capacity {
      self.drain(Some(deadline)).await?;
    }
    self.buffer.push_back(payload);
    self.drain(Some(deadline)).await
  }

  /// Single best-effort attempt at the oldest un-acknowledged item.
  ///
  /// The new item is appended behind any backlog first — order of attempt
  /// is strictly oldest-first. Returns `Ok` only when the attempt leaves
  /// the buffer empty; a surviving backlog is reported as `QueueFull` so
  /// the caller sees backpressure, with every item retained for the next
  /// `put`/drain cycle.
  ///
  /// # Errors
  ///
  /// `QueueFull` when the buffer is at capacity (item rejected) or when
  /// items remain buffered after the attempt.
  pub async fn put_nowait(&mut self, item: M) -> Result<(), FabricError> {
    let payload = frame::encode(&item)?;
    if self.buffer.len() >= self.capacity {
      return Err(FabricError::QueueFull);
    }
    self.buffer.push_back(payload);

    if let Some(head) = self.buffer.front().cloned() {
      // Short fraction of the per-attempt timeout: a reachable consumer
      // acks well within it, an unreachable one should not stall a
      // non-blocking call for the full window.
      let wait = self.attempt_timeout / 5 + Duration::from_millis(1);
      match self.requester.request(&head, wait).await {
        Ok(_ack) => {
          self.buffer.pop_front();
        }
        Err(FabricError::Timeout(_)) | Err(FabricError::Io(_)) => {
          self.requester.reset();
          return Err(FabricError::QueueFull);
        }
        Err(e) => return Err(e),
      }
    }

    if self.buffer.is_empty() {
      Ok(())
    } else {
      Err(FabricError::QueueFull)
    }
  }

  /// Closes the underlying requester. Buffered items are lost — the fabric
  /// holds no persistent state.
  pub fn close(&mut self) {
    self.requester.close();
  }

  async fn drain(&mut self, deadline: Option<Instant>) -> Result<(), FabricError> {
    while let Some(head) = self.buffer.front().cloned() {
      let started = Instant::now();
      match self.requester.request(&head, self.attempt_timeout).await {
        Ok(_ack) => {
          self.buffer.pop_front();
        }
        Err(FabricError::Timeout(_)) | Err(FabricError::Io(_)) => {
          debug!(port = self.requester.port(), "delivery attempt failed, reconnecting");
          self.requester.reset();
          if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
              return Err(FabricError::Timeout(self.attempt_timeout));
            }
          }
          // A connection refused fails instantly; pace retries to one
          // attempt per timeout window instead of hot-looping.
          let elapsed = started.elapsed();
          if elapsed < self.attempt_timeout {
            sleep(self.attempt_timeout - elapsed).await;
          }
        }
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }
}

#[async_trait::async_trait]
impl<M: Payload> MessageQueue<M> for QueueProducer<M> {
  async fn put(&mut self, item: M) -> Result<(), FabricError> {
    QueueProducer::put(self, item).await
  }

  async fn put_nowait(&mut self, item: M) -> Result<(), FabricError> {
    QueueProducer::put_nowait(self, item).await
  }

  async fn get(&mut self, _wait: Duration) -> Result<Option<M>, FabricError> {
    Err(FabricError::UnsupportedOperation(
      "QueueProducer does not support get",
    ))
  }

  fn get_nowait(&mut self) -> Result<M, FabricError> {
    Err(FabricError::UnsupportedOperation(
      "QueueProducer does not support get_nowait",
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::QueueConsumer;

  #[tokio::test]
  async fn test_put_nowait_against_dead_peer_buffers_the_item() {
    let mut producer: QueueProducer<String> =
      QueueProducer::connect(1).with_attempt_timeout(Duration::from_millis(50));
    let result = producer.put_nowait("orphan".to_string()).await;
    assert!(matches!(result, Err(FabricError::QueueFull)));
    assert_eq!(producer.buffered(), 1);
  }

  #[tokio::test]
  async fn test_put_nowait_rejects_when_buffer_is_full() {
    let mut producer: QueueProducer<String> = QueueProducer::connect(1)
      .with_capacity(1)
      .with_attempt_timeout(Duration::from_millis(50));
    assert!(producer.put_nowait("first".to_string()).await.is_err());
    // Buffer now holds the first item; a second non-blocking put must be
    // rejected without disturbing it.
    let result = producer.put_nowait("second".to_string()).await;
    assert!(matches!(result, Err(FabricError::QueueFull)));
    assert_eq!(producer.buffered(), 1);
  }

  #[tokio::test]
  async fn test_put_timeout_expires_with_buffer_intact() {
    let mut producer: QueueProducer<String> =
      QueueProducer::connect(1).with_attempt_timeout(Duration::from_millis(50));
    let result = producer
      .put_timeout("stuck".to_string(), Duration::from_millis(150))
      .await;
    assert!(matches!(result, Err(FabricError::Timeout(_))));
    assert_eq!(producer.buffered(), 1);
  }

  #[tokio::test]
  async fn test_get_on_producer_is_unsupported() {
    let mut producer: QueueProducer<String> = QueueProducer::connect(1);
    let result = MessageQueue::get(&mut producer, Duration::from_millis(10)).await;
    assert!(matches!(result, Err(FabricError::UnsupportedOperation(_))));
    assert!(matches!(
      producer.get_nowait(),
      Err(FabricError::UnsupportedOperation(_))
    ));
  }

  #[tokio::test]
  async fn test_put_delivers_to_live_consumer() {
    let mut consumer: QueueConsumer<String> = QueueConsumer::bind(None).await.expect("bind");
    let mut producer: QueueProducer<String> = QueueProducer::connect(consumer.port());

    let collect = tokio::spawn(async move {
      let item = consumer.get(Duration::from_secs(2)).await.expect("get");
      (item, consumer)
    });

    producer.put("payload".to_string()).await.expect("put");
    let (item, _consumer) = collect.await.expect("join");
    assert_eq!(item.as_deref(), Some("payload"));
    assert_eq!(producer.buffered(), 0);
  }
}
