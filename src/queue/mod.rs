//! # Queue Abstractions
//!
//! The queue layer gives nodes two ways to move items between processes:
//!
//! - [`QueueProducer`] / [`QueueConsumer`] — the **reliable** path, built on
//!   the request/reply duality: every item is individually acknowledged, a
//!   silent peer is detected deterministically by timeout, and the producer
//!   buffers and retries until the item lands (head-of-line, strict FIFO).
//! - [`PubSubQueue`] — the **best-effort** path: a publish/subscribe pair
//!   looped through one port, for same-host handoff where occasional loss
//!   is acceptable.
//!
//! All of them implement [`MessageQueue`]; a role that does not support an
//! operation (consuming from a producer, producing into a consumer) fails
//! with [`UnsupportedOperation`](crate::error::FabricError::UnsupportedOperation)
//! rather than silently misbehaving.

use async_trait::async_trait;
use tokio::time::Duration;

use crate::error::FabricError;

pub mod consumer;
pub mod local;
pub mod producer;

pub use consumer::QueueConsumer;
pub use local::PubSubQueue;
pub use producer::QueueProducer;

/// Capability set shared by every inter-process queue.
///
/// Mirrors the four operations a queue endpoint can offer; implementations
/// reject the operations their role does not support.
#[async_trait]
pub trait MessageQueue<M>: Send {
  /// Enqueues one item, blocking until it is accepted by the peer (or, for
  /// unacknowledged queues, handed to the transport).
  async fn put(&mut self, item: M) -> Result<(), FabricError>;

  /// Single best-effort enqueue attempt.
  ///
  /// # Errors
  ///
  /// `QueueFull` when the attempt could not complete; the caller applies
  /// its own backpressure.
  async fn put_nowait(&mut self, item: M) -> Result<(), FabricError>;

  /// Dequeues one item, waiting up to `wait`. `Ok(None)` means the timeout
  /// expired with nothing pending.
  async fn get(&mut self, wait: Duration) -> Result<Option<M>, FabricError>;

  /// Non-blocking dequeue.
  ///
  /// # Errors
  ///
  /// `Empty` when nothing is pending.
  fn get_nowait(&mut self) -> Result<M, FabricError>;
}
