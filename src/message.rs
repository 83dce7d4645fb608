//! # Message Payloads
//!
//! The fabric is payload-type-agnostic: every channel, queue, and mailbox is
//! generic over a [`Payload`] — anything serde can move across the wire.
//! This module also ships the typed attribute records used by the
//! image-pipeline deployments: a [`Frame`] carrying encoded image bytes and
//! its detection [`BoundingBox`]es, plus the label and keypoint attributes
//! that models attach to boxes.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Marker for anything the fabric can carry: serde-serializable, sendable
/// across tasks, and owned. Blanket-implemented; never implement manually.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + 'static {}

fn default_source_node() -> i64 {
  -1
}

fn default_reid() -> String {
  "-1".to_string()
}

/// Class membership attached to a box by a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLabel {
  /// Class identifier.
  pub class_id: String,
  /// Classifier confidence, when the model reports one.
  #[serde(default)]
  pub score: Option<f32>,
  /// Id of the node that produced this attribute; -1 when unattributed.
  #[serde(default = "default_source_node")]
  pub source_node_id: i64,
}

/// Recognized text with confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLabel {
  /// Recognized text.
  pub text: String,
  /// Recognition confidence.
  pub score: f32,
}

/// Detection box in absolute pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  /// Left edge.
  pub x1: f32,
  /// Top edge.
  pub y1: f32,
  /// Right edge.
  pub x2: f32,
  /// Bottom edge.
  pub y2: f32,
  /// Detected class identifier.
  pub class_id: String,
  /// Detector confidence.
  pub score: f32,
  /// Secondary labels attached by downstream classifiers.
  #[serde(default)]
  pub labels: Vec<ClassLabel>,
  /// Re-identification tag; "-1" until a tracker assigns one.
  #[serde(default = "default_reid")]
  pub reid: String,
  /// Id of the node that produced this box; -1 when unattributed.
  #[serde(default = "default_source_node")]
  pub source_node_id: i64,
}

/// Relative keypoint (coordinates in 0.0..=1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
  /// Horizontal position, relative.
  pub x: f32,
  /// Vertical position, relative.
  pub y: f32,
  /// Keypoint class identifier.
  pub class_id: String,
  /// Model confidence.
  pub score: f32,
}

/// Named keypoint set — body parts, facial landmarks, and similar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoints {
  /// Keypoints by name.
  #[serde(default)]
  pub keypoints: HashMap<String, Keypoint>,
  /// Free-form description of the set.
  #[serde(default)]
  pub description: String,
}

/// One unit of work flowing through an image pipeline: encoded image bytes
/// plus capture metadata and accumulated detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
  /// Encoded image bytes (the fabric never decodes them).
  pub image: Bytes,
  /// Capture timestamp.
  pub timestamp: DateTime<Utc>,
  /// Origin of the frame, e.g. the source file path.
  pub source_frame: String,
  /// Monotonic frame counter assigned by the source node.
  pub frame_id: u64,
  /// Detections accumulated so far.
  #[serde(default)]
  pub boxes: Vec<BoundingBox>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::{decode, encode};

  #[test]
  fn test_frame_survives_the_wire_encoding() {
    let frame = Frame {
      image: Bytes::from_static(&[0xff, 0xd8, 0xff]),
      timestamp: Utc::now(),
      source_frame: "cam0/0001.jpg".to_string(),
      frame_id: 7,
      boxes: vec![BoundingBox {
        x1: 10.0,
        y1: 20.0,
        x2: 110.0,
        y2: 220.0,
        class_id: "person".to_string(),
        score: 0.93,
        labels: vec![],
        reid: "-1".to_string(),
        source_node_id: 2,
      }],
    };
    let encoded = encode(&frame).expect("encode");
    let decoded: Frame = decode(&encoded).expect("decode");
    assert_eq!(decoded, frame);
  }

  #[test]
  fn test_box_defaults_apply_on_sparse_input() {
    let raw = r#"{"x1":0,"y1":0,"x2":1,"y2":1,"class_id":"car","score":0.5}"#;
    let parsed: BoundingBox = serde_json::from_str(raw).expect("parse");
    assert_eq!(parsed.reid, "-1");
    assert_eq!(parsed.source_node_id, -1);
    assert!(parsed.labels.is_empty());
  }
}
