//! # MeshWeave
//!
//! Node-based distributed processing fabric in pure Rust.
//!
//! Independently running worker nodes exchange typed messages over a
//! publish/subscribe topology whose edges are declared by configuration.
//! The fabric supplies the messaging primitives; node bodies are plain
//! `process(input) -> output` transformations plugged in through a factory.
//!
//! ## Key Pieces
//!
//! - **Transport**: fan-out publish / fan-in subscribe plus a synchronous
//!   request/reply exchange, over loopback TCP with ephemeral ports
//! - **Reliable queue**: acknowledgment-based, buffered, retry-on-timeout
//!   producer/consumer built on request/reply
//! - **Mailbox**: per-node endpoint merging many inbound publishers into
//!   one ordered inbox and fanning sends to many subscribers
//! - **Topology builder**: declarative node graph in, wired mailboxes out
//! - **Node runtime**: a crash-isolated process loop per node
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshweave::nodes::standard_factory;
//! use meshweave::{Pipeline, config};
//!
//! # async fn example() -> Result<(), meshweave::FabricError> {
//! let spec = config::load_topology("pipeline.json")?;
//! let mut pipeline = Pipeline::launch(&spec, &standard_factory()).await?;
//! // ... frames flow ...
//! pipeline.stop().await;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Topology configuration loading.
pub mod config;
/// Structured error taxonomy for the fabric.
pub mod error;
/// Node factory keyed by type tag.
pub mod factory;
/// Per-node mailbox endpoint.
pub mod mailbox;
/// Payload trait and shipped message schemas.
pub mod message;
/// Node trait and the runtime loop driving it.
pub mod node;
/// Built-in node bodies.
pub mod nodes;
/// Whole-topology assembly and lifecycle.
pub mod pipeline;
/// Reliable and best-effort inter-process queues.
pub mod queue;
/// Declarative topology graph and its builder.
pub mod topology;
/// Socket-pattern transport primitives.
pub mod transport;

pub use error::FabricError;
pub use factory::NodeFactory;
pub use mailbox::{Mailbox, MailboxLike};
pub use message::{BoundingBox, ClassLabel, Frame, Keypoint, Keypoints, Payload, TextLabel};
pub use node::{Node, NodeError, NodeKind, NodeRuntime, NodeState};
pub use pipeline::Pipeline;
pub use queue::{MessageQueue, PubSubQueue, QueueConsumer, QueueProducer};
pub use topology::{NodeSpec, TopologyBuilder, TopologySpec};
