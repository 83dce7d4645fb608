//! Frame save node: writes each frame's encoded image bytes to a target
//! directory as `frame_<id>.jpg` and passes the frame through unchanged, so
//! it can sit mid-pipeline as a tap or at the end as a sink.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::message::Frame;
use crate::node::{Node, NodeError};
use crate::topology::NodeSpec;

#[derive(Debug, Deserialize)]
struct Params {
  save_dir: PathBuf,
}

/// Writes incoming frames to disk and forwards them unchanged.
pub struct SaveFrameNode {
  save_dir: PathBuf,
}

impl SaveFrameNode {
  /// Creates the node, creating the target directory if needed.
  pub fn new(save_dir: impl Into<PathBuf>) -> Result<Self, NodeError> {
    let save_dir = save_dir.into();
    std::fs::create_dir_all(&save_dir)?;
    Ok(Self { save_dir })
  }

  /// Factory constructor from a node spec's `params`: `save_dir` (required).
  pub fn from_spec(spec: &NodeSpec) -> Result<Box<dyn Node<Frame>>, NodeError> {
    let params: Params = serde_json::from_value(spec.params.clone())?;
    Ok(Box::new(Self::new(params.save_dir)?))
  }
}

#[async_trait::async_trait]
impl Node<Frame> for SaveFrameNode {
  async fn process(&mut self, frame: Frame) -> Result<Option<Frame>, NodeError> {
    let path = self.save_dir.join(format!("frame_{}.jpg", frame.frame_id));
    tokio::fs::write(&path, &frame.image).await?;
    debug!(path = %path.display(), frame_id = frame.frame_id, "saved frame");
    Ok(Some(frame))
  }
}
