//! Folder frame source: reads image files from a directory and emits them
//! as [`Frame`]s, in filename order, with a configurable inter-frame delay.
//! `loop` mode restarts from the first file after the last; `only_one` mode
//! emits the folder once and then runs dry.

use std::path::PathBuf;

use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::message::Frame;
use crate::node::{Node, NodeError, NodeKind};
use crate::topology::NodeSpec;

/// How the source walks the folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ReadMode {
  /// Restart from the first file after the last.
  #[default]
  #[serde(rename = "loop")]
  Loop,
  /// Emit every file once, then run dry.
  #[serde(rename = "only_one")]
  Once,
}

#[derive(Debug, Deserialize)]
struct Params {
  folder_path: PathBuf,
  #[serde(default)]
  mode: ReadMode,
  #[serde(default = "default_frame_delay_ms")]
  frame_delay_ms: u64,
}

fn default_frame_delay_ms() -> u64 {
  10
}

/// Source node emitting one [`Frame`] per image file in a folder.
pub struct FolderFrameSource {
  files: Vec<PathBuf>,
  mode: ReadMode,
  frame_delay: Duration,
  index: usize,
  frame_id: u64,
  finished: bool,
}

impl FolderFrameSource {
  /// Creates the source over the given folder. The file list is captured
  /// here, sorted by name; files added later are not picked up.
  pub fn new(folder: impl Into<PathBuf>) -> Result<Self, NodeError> {
    let folder = folder.into();
    let mut files: Vec<PathBuf> = std::fs::read_dir(&folder)?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| path.is_file())
      .collect();
    files.sort();
    Ok(Self {
      files,
      mode: ReadMode::Loop,
      frame_delay: Duration::from_millis(default_frame_delay_ms()),
      index: 0,
      frame_id: 0,
      finished: false,
    })
  }

  /// Sets the read mode.
  #[must_use]
  pub fn with_mode(mut self, mode: ReadMode) -> Self {
    self.mode = mode;
    self
  }

  /// Sets the delay inserted after each emitted frame.
  #[must_use]
  pub fn with_frame_delay(mut self, delay: Duration) -> Self {
    self.frame_delay = delay;
    self
  }

  /// Factory constructor from a node spec's `params`:
  /// `folder_path` (required), `mode`, `frame_delay_ms`.
  pub fn from_spec(spec: &NodeSpec) -> Result<Box<dyn Node<Frame>>, NodeError> {
    let params: Params = serde_json::from_value(spec.params.clone())?;
    let source = Self::new(params.folder_path)?
      .with_mode(params.mode)
      .with_frame_delay(Duration::from_millis(params.frame_delay_ms));
    Ok(Box::new(source))
  }
}

#[async_trait::async_trait]
impl Node<Frame> for FolderFrameSource {
  fn kind(&self) -> NodeKind {
    NodeKind::Source
  }

  async fn produce(&mut self) -> Result<Option<Frame>, NodeError> {
    if self.files.is_empty() {
      return Ok(None);
    }
    if self.index >= self.files.len() {
      match self.mode {
        ReadMode::Loop => self.index = 0,
        ReadMode::Once => {
          if !self.finished {
            self.finished = true;
            info!(frames = self.frame_id, "folder exhausted");
          }
          return Ok(None);
        }
      }
    }

    let path = self.files[self.index].clone();
    let image = match tokio::fs::read(&path).await {
      Ok(image) => image,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "failed to read frame, skipping");
        self.index += 1;
        return Ok(None);
      }
    };
    debug!(path = %path.display(), frame_id = self.frame_id, "read frame");

    let frame = Frame {
      image: Bytes::from(image),
      timestamp: Utc::now(),
      source_frame: path.display().to_string(),
      frame_id: self.frame_id,
      boxes: Vec::new(),
    };
    self.index += 1;
    self.frame_id += 1;

    sleep(self.frame_delay).await;
    Ok(Some(frame))
  }

  async fn process(&mut self, _input: Frame) -> Result<Option<Frame>, NodeError> {
    Ok(None)
  }
}
