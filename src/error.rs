//! # Fabric Error Taxonomy
//!
//! Structured errors for the messaging fabric. Every recoverable condition
//! (`Timeout`, `QueueFull`, `Empty`) is distinguishable from programming
//! errors (`ClosedEndpoint`, `UnsupportedOperation`) and from build-time
//! failures (`UnknownNodeReference`, `DuplicateNode`), so callers can apply
//! the right policy without string matching.
//!
//! Per-message node failures are deliberately *not* part of this enum: they
//! are carried as [`NodeError`](crate::node::NodeError), consumed by the node
//! runtime loop, logged, and never propagated to peers.

use std::io;
use std::time::Duration;

/// Error type for all fabric-level operations.
///
/// Transport, queue, mailbox, and topology operations all surface this
/// type. The recoverable variants (`Timeout`, `QueueFull`, `Empty`) signal
/// normal flow-control conditions; the remaining variants are programming
/// or construction errors.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
  /// I/O error from the underlying socket.
  #[error("network error: {0}")]
  Io(#[from] io::Error),

  /// Payload could not be serialized or deserialized.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Operation attempted after the endpoint was closed. Programming error,
  /// never retried.
  #[error("endpoint is closed")]
  ClosedEndpoint,

  /// Role mismatch: the operation is not supported by this queue role
  /// (e.g. consuming from a producer). Programming error.
  #[error("operation not supported by this role: {0}")]
  UnsupportedOperation(&'static str),

  /// A bounded wait expired with no data or acknowledgment. Recoverable;
  /// the caller decides the retry policy.
  #[error("timed out after {0:?}")]
  Timeout(Duration),

  /// Non-blocking enqueue could not complete. Caller-visible backpressure
  /// signal; buffered items are intact.
  #[error("queue is full")]
  QueueFull,

  /// Non-blocking dequeue had nothing pending. Normal "no data" signal,
  /// not a failure.
  #[error("queue is empty")]
  Empty,

  /// A declared edge references a node id that does not exist in the
  /// topology. Fatal to the build; no partial topology is returned.
  #[error("edge '{from}' -> '{target}' references undeclared node '{target}'")]
  UnknownNodeReference {
    /// Node id on the sending side of the offending edge.
    from: String,
    /// The undeclared node id the edge points at.
    target: String,
  },

  /// The same node id was declared more than once. Fatal to the build.
  #[error("node id '{0}' declared more than once")]
  DuplicateNode(String),

  /// The node factory has no constructor registered for this type tag.
  #[error("unknown node type: {0}")]
  UnknownNodeType(String),

  /// A registered node constructor rejected its configuration.
  #[error("failed to construct node '{node}': {reason}")]
  NodeConstruction {
    /// Id of the node whose construction failed.
    node: String,
    /// Constructor's error description.
    reason: String,
  },

  /// Topology configuration file does not exist.
  #[error("topology config not found: {0}")]
  ConfigNotFound(String),

  /// Incoming wire frame exceeds the maximum accepted length.
  #[error("frame of {0} bytes exceeds the maximum frame length")]
  FrameTooLarge(usize),
}
