//! # Built-In Nodes
//!
//! The node bodies shipped with the fabric, all working over the
//! [`Frame`](crate::message::Frame) payload: a folder-backed frame source
//! and a frame save node. [`standard_factory`] returns a
//! [`NodeFactory`](crate::factory::NodeFactory) with every built-in
//! registered under its type tag; embedders extend it with their own.

pub mod folder_source;
pub mod save_frame;

pub use folder_source::{FolderFrameSource, ReadMode};
pub use save_frame::SaveFrameNode;

use crate::factory::NodeFactory;
use crate::message::Frame;

/// Returns a factory with every built-in node registered:
/// `folder_source` and `save_frame`.
pub fn standard_factory() -> NodeFactory<Frame> {
  let mut factory = NodeFactory::new();
  factory.register("folder_source", FolderFrameSource::from_spec);
  factory.register("save_frame", SaveFrameNode::from_spec);
  factory
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_standard_factory_registers_builtins() {
    let factory = standard_factory();
    let mut types = factory.registered_types();
    types.sort_unstable();
    assert_eq!(types, vec!["folder_source", "save_frame"]);
  }
}
