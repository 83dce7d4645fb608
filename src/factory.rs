//! # Node Factory
//!
//! Runtime registry mapping a `type` tag to a node constructor. The
//! topology configuration names node types as strings; embedders register
//! a constructor per tag and the factory builds each node from its
//! [`NodeSpec`] — type tag, free-form `params`, and all. An unknown tag is
//! a build-time error, not a silent skip.

use std::collections::HashMap;

use tracing::debug;

use crate::error::FabricError;
use crate::message::Payload;
use crate::node::{Node, NodeError};
use crate::topology::NodeSpec;

/// Constructor registered for one node type tag.
pub type NodeConstructor<M> =
  Box<dyn Fn(&NodeSpec) -> Result<Box<dyn Node<M>>, NodeError> + Send + Sync>;

/// Registry of node constructors keyed by type tag.
pub struct NodeFactory<M> {
  constructors: HashMap<String, NodeConstructor<M>>,
}

impl<M: Payload> NodeFactory<M> {
  /// Creates an empty factory.
  pub fn new() -> Self {
    Self {
      constructors: HashMap::new(),
    }
  }

  /// Registers a constructor for a type tag, replacing any previous one.
  pub fn register<F>(&mut self, node_type: impl Into<String>, constructor: F)
  where
    F: Fn(&NodeSpec) -> Result<Box<dyn Node<M>>, NodeError> + Send + Sync + 'static,
  {
    let node_type = node_type.into();
    debug!(node_type = %node_type, "registered node constructor");
    self.constructors.insert(node_type, Box::new(constructor));
  }

  /// Returns the registered type tags.
  pub fn registered_types(&self) -> Vec<&str> {
    self.constructors.keys().map(String::as_str).collect()
  }

  /// Constructs the node described by `spec`.
  ///
  /// # Errors
  ///
  /// `UnknownNodeType` when the spec carries no type or an unregistered
  /// one; `NodeConstruction` when the registered constructor rejects the
  /// spec's parameters.
  pub fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node<M>>, FabricError> {
    let node_type = spec
      .node_type
      .as_deref()
      .ok_or_else(|| FabricError::UnknownNodeType(format!("<missing type on '{}'>", spec.id)))?;
    let constructor = self
      .constructors
      .get(node_type)
      .ok_or_else(|| FabricError::UnknownNodeType(node_type.to_string()))?;
    constructor(spec).map_err(|e| FabricError::NodeConstruction {
      node: spec.id.clone(),
      reason: e.to_string(),
    })
  }
}

impl<M: Payload> Default for NodeFactory<M> {
  fn default() -> Self {
    Self::new()
  }
}
