//! # Topology Builder
//!
//! Turns a declarative node graph — node ids plus named output edges — into
//! a fully wired set of live mailboxes before any node starts processing.
//!
//! The build is strictly two-pass, and the order is load-bearing: pass one
//! constructs a mailbox per declared node (each self-allocates its inbound
//! port); pass two wires `source.add_publisher(target_inbound_port)` for
//! every declared edge. An edge cannot be wired until the target's port
//! exists, so all mailboxes must exist before any wiring happens.
//!
//! Cycles are permitted — a node may sit both upstream and downstream of
//! another — and are not detected here; not deadlocking on one's own output
//! is a node-runtime concern. Any edge naming an undeclared node fails the
//! whole build: mailboxes already created are stopped and no partial
//! topology is returned.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FabricError;
use crate::mailbox::Mailbox;
use crate::message::Payload;

/// Declarative description of one node: identity, wiring, and the
/// construction inputs consumed by the node factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
  /// Unique node identifier; doubles as the mailbox name.
  pub id: String,
  /// Factory type tag, e.g. `"folder_source"`. Optional for topologies
  /// whose nodes are constructed by hand.
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub node_type: Option<String>,
  /// Ids of the nodes this one sends its output to.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub outputs: Vec<String>,
  /// Free-form constructor parameters, passed through to the factory.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub params: serde_json::Value,
}

impl NodeSpec {
  /// Creates a spec with no wiring and no factory inputs.
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      node_type: None,
      outputs: Vec::new(),
      params: serde_json::Value::Null,
    }
  }

  /// Sets the factory type tag.
  #[must_use]
  pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
    self.node_type = Some(node_type.into());
    self
  }

  /// Declares the downstream node ids this node outputs to.
  #[must_use]
  pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.outputs = outputs.into_iter().map(Into::into).collect();
    self
  }

  /// Sets the free-form constructor parameters.
  #[must_use]
  pub fn with_params(mut self, params: serde_json::Value) -> Self {
    self.params = params;
    self
  }
}

/// The declarative node graph consumed by the builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySpec {
  /// Node descriptors, one per node.
  pub nodes: Vec<NodeSpec>,
}

impl TopologySpec {
  /// Creates an empty topology.
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a node descriptor.
  #[must_use]
  pub fn node(mut self, spec: NodeSpec) -> Self {
    self.nodes.push(spec);
    self
  }

  /// Looks up a node descriptor by id.
  pub fn find(&self, id: &str) -> Option<&NodeSpec> {
    self.nodes.iter().find(|node| node.id == id)
  }
}

/// Builder that materializes a [`TopologySpec`] into live, wired mailboxes.
pub struct TopologyBuilder {
  inbox_capacity: usize,
}

impl TopologyBuilder {
  /// Creates a builder with the default mailbox inbox capacity.
  pub fn new() -> Self {
    Self {
      inbox_capacity: crate::mailbox::DEFAULT_INBOX_CAPACITY,
    }
  }

  /// Sets the inbox capacity used for every constructed mailbox.
  #[must_use]
  pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
    self.inbox_capacity = capacity;
    self
  }

  /// Builds one live mailbox per declared node and wires every declared
  /// edge, returning the mailbox map keyed by node id.
  ///
  /// # Errors
  ///
  /// `DuplicateNode` when an id is declared twice and
  /// `UnknownNodeReference` when an edge targets an undeclared id; in both
  /// cases every mailbox created so far is stopped first — no partial
  /// topology, no leaked receiver loops.
  pub async fn build<M: Payload>(
    &self,
    spec: &TopologySpec,
  ) -> Result<HashMap<String, Mailbox<M>>, FabricError> {
    let mut mailboxes: HashMap<String, Mailbox<M>> = HashMap::new();

    // Pass 1: every node gets its mailbox (and thereby its inbound port).
    for node in &spec.nodes {
      if mailboxes.contains_key(&node.id) {
        stop_all(&mut mailboxes).await;
        return Err(FabricError::DuplicateNode(node.id.clone()));
      }
      let mailbox = match Mailbox::with_capacity(node.id.clone(), self.inbox_capacity).await {
        Ok(mailbox) => mailbox,
        Err(e) => {
          stop_all(&mut mailboxes).await;
          return Err(e);
        }
      };
      mailboxes.insert(node.id.clone(), mailbox);
    }

    // Pass 2: wire every declared edge against the now-known ports.
    for node in &spec.nodes {
      for target in &node.outputs {
        let target_port = mailboxes.get(target).map(Mailbox::inbound_port);
        let Some(port) = target_port else {
          stop_all(&mut mailboxes).await;
          return Err(FabricError::UnknownNodeReference {
            from: node.id.clone(),
            target: target.clone(),
          });
        };
        if let Some(source_mailbox) = mailboxes.get(&node.id) {
          source_mailbox.add_publisher(port).await;
          debug!(source = %node.id, target = %target, port, "wired edge");
        }
      }
    }

    info!(nodes = mailboxes.len(), "topology built");
    Ok(mailboxes)
  }
}

impl Default for TopologyBuilder {
  fn default() -> Self {
    Self::new()
  }
}

async fn stop_all<M: Payload>(mailboxes: &mut HashMap<String, Mailbox<M>>) {
  for (_, mut mailbox) in mailboxes.drain() {
    mailbox.stop().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_build_wires_declared_edges() {
    let spec = TopologySpec::new()
      .node(NodeSpec::new("a").with_outputs(["b"]))
      .node(NodeSpec::new("b"));
    let mut mailboxes = TopologyBuilder::new().build::<String>(&spec).await.expect("build");

    let b_port = mailboxes["b"].inbound_port();
    assert_eq!(mailboxes["a"].publisher_ports().await, vec![b_port]);
    assert!(mailboxes["b"].publisher_ports().await.is_empty());

    stop_all(&mut mailboxes).await;
  }

  #[tokio::test]
  async fn test_unknown_target_fails_the_whole_build() {
    let spec = TopologySpec::new().node(NodeSpec::new("a").with_outputs(["ghost"]));
    let result = TopologyBuilder::new().build::<String>(&spec).await;
    assert!(matches!(
      result,
      Err(FabricError::UnknownNodeReference { from, target })
        if from == "a" && target == "ghost"
    ));
  }

  #[tokio::test]
  async fn test_duplicate_id_fails_the_whole_build() {
    let spec = TopologySpec::new()
      .node(NodeSpec::new("a"))
      .node(NodeSpec::new("a"));
    let result = TopologyBuilder::new().build::<String>(&spec).await;
    assert!(matches!(result, Err(FabricError::DuplicateNode(id)) if id == "a"));
  }

  #[tokio::test]
  async fn test_cycles_are_permitted() {
    let spec = TopologySpec::new()
      .node(NodeSpec::new("a").with_outputs(["b"]))
      .node(NodeSpec::new("b").with_outputs(["a"]));
    let mut mailboxes = TopologyBuilder::new().build::<String>(&spec).await.expect("build");
    assert_eq!(mailboxes.len(), 2);
    stop_all(&mut mailboxes).await;
  }

  #[test]
  fn test_spec_round_trips_through_json() {
    let spec = TopologySpec::new().node(
      NodeSpec::new("reader")
        .with_type("folder_source")
        .with_outputs(["resize", "save"]),
    );
    let raw = serde_json::to_string(&spec).expect("serialize");
    let parsed: TopologySpec = serde_json::from_str(&raw).expect("parse");
    assert_eq!(parsed.nodes.len(), 1);
    assert_eq!(parsed.nodes[0].id, "reader");
    assert_eq!(parsed.nodes[0].outputs, vec!["resize", "save"]);
  }
}
