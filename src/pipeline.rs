//! # Pipeline Assembly
//!
//! The front door for running a whole topology: build the wired mailboxes,
//! construct every node through the factory, and launch one runtime per
//! node. Construction failures tear down everything already started — the
//! same no-partial-result policy as the topology builder.

use futures::future::join_all;
use tracing::info;

use crate::error::FabricError;
use crate::factory::NodeFactory;
use crate::message::Payload;
use crate::node::{NodeRuntime, NodeState};
use crate::topology::{TopologyBuilder, TopologySpec};

/// A launched topology: one running [`NodeRuntime`] per declared node.
pub struct Pipeline {
  runtimes: Vec<NodeRuntime>,
}

impl Pipeline {
  /// Builds the topology, constructs every node via the factory, and
  /// launches the runtimes.
  ///
  /// # Errors
  ///
  /// Any topology build error, plus `UnknownNodeType`/`NodeConstruction`
  /// from the factory. On error everything already launched is stopped and
  /// every remaining mailbox is closed.
  pub async fn launch<M: Payload + Sync>(
    spec: &TopologySpec,
    factory: &NodeFactory<M>,
  ) -> Result<Self, FabricError> {
    let mut mailboxes = TopologyBuilder::new().build::<M>(spec).await?;
    let mut runtimes: Vec<NodeRuntime> = Vec::new();

    for node_spec in &spec.nodes {
      let node = match factory.create(node_spec) {
        Ok(node) => node,
        Err(e) => {
          join_all(runtimes.iter_mut().map(|runtime| runtime.stop())).await;
          for (_, mut mailbox) in mailboxes.drain() {
            mailbox.stop().await;
          }
          return Err(e);
        }
      };
      // The builder produced exactly one mailbox per declared node.
      let Some(mailbox) = mailboxes.remove(&node_spec.id) else {
        continue;
      };
      runtimes.push(NodeRuntime::spawn(node_spec.id.clone(), node, mailbox));
    }

    info!(nodes = runtimes.len(), "pipeline launched");
    Ok(Self { runtimes })
  }

  /// Ids of the launched nodes, in declaration order.
  pub fn node_ids(&self) -> Vec<&str> {
    self.runtimes.iter().map(NodeRuntime::id).collect()
  }

  /// Lifecycle state per node, in declaration order.
  pub fn states(&self) -> Vec<(&str, NodeState)> {
    self
      .runtimes
      .iter()
      .map(|runtime| (runtime.id(), runtime.state()))
      .collect()
  }

  /// Whether every node runtime is currently running.
  pub fn is_running(&self) -> bool {
    self.runtimes.iter().all(NodeRuntime::is_running)
  }

  /// Stops every node runtime, concurrently. Idempotent.
  pub async fn stop(&mut self) {
    join_all(self.runtimes.iter_mut().map(|runtime| runtime.stop())).await;
    info!("pipeline stopped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::{Node, NodeError};
  use crate::topology::NodeSpec;
  use async_trait::async_trait;

  struct EchoNode;

  #[async_trait]
  impl Node<String> for EchoNode {
    async fn process(&mut self, input: String) -> Result<Option<String>, NodeError> {
      Ok(Some(input))
    }
  }

  fn echo_factory() -> NodeFactory<String> {
    let mut factory = NodeFactory::new();
    factory.register("echo", |_spec| Ok(Box::new(EchoNode) as Box<dyn Node<String>>));
    factory
  }

  #[tokio::test]
  async fn test_launch_spawns_a_runtime_per_node() {
    let spec = TopologySpec::new()
      .node(NodeSpec::new("a").with_type("echo").with_outputs(["b"]))
      .node(NodeSpec::new("b").with_type("echo"));
    let mut pipeline = Pipeline::launch(&spec, &echo_factory()).await.expect("launch");
    assert_eq!(pipeline.node_ids(), vec!["a", "b"]);
    pipeline.stop().await;
    assert!(pipeline.states().iter().all(|(_, s)| *s == NodeState::Stopped));
  }

  #[tokio::test]
  async fn test_unknown_type_aborts_the_launch() {
    let spec = TopologySpec::new().node(NodeSpec::new("a").with_type("mystery"));
    let result = Pipeline::launch(&spec, &echo_factory()).await;
    assert!(matches!(result, Err(FabricError::UnknownNodeType(_))));
  }

  #[tokio::test]
  async fn test_stop_is_idempotent() {
    let spec = TopologySpec::new().node(NodeSpec::new("solo").with_type("echo"));
    let mut pipeline = Pipeline::launch(&spec, &echo_factory()).await.expect("launch");
    pipeline.stop().await;
    pipeline.stop().await;
  }
}
