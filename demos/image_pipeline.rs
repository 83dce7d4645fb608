//! Minimal image pipeline: a folder frame source fanned into a frame save
//! node, wired from a JSON topology document.
//!
//! Run with `cargo run --example image_pipeline`.

use std::error::Error;

use meshweave::nodes::standard_factory;
use meshweave::{Pipeline, config};
use tokio::time::{Duration, sleep};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .init();

  // Stage a tiny input folder and a topology document to load.
  let workdir = std::env::temp_dir().join("meshweave-demo");
  let frames_dir = workdir.join("frames");
  let output_dir = workdir.join("out");
  std::fs::create_dir_all(&frames_dir)?;
  for i in 0..3 {
    std::fs::write(frames_dir.join(format!("{i:04}.jpg")), format!("frame-{i}"))?;
  }

  let topology_path = workdir.join("pipeline.json");
  let document = serde_json::json!({
    "nodes": [
      {
        "id": "reader",
        "type": "folder_source",
        "outputs": ["saver"],
        "params": { "folder_path": frames_dir, "mode": "only_one", "frame_delay_ms": 20 }
      },
      {
        "id": "saver",
        "type": "save_frame",
        "params": { "save_dir": output_dir }
      }
    ]
  });
  std::fs::write(&topology_path, serde_json::to_string_pretty(&document)?)?;

  let spec = config::load_topology(&topology_path)?;
  let mut pipeline = Pipeline::launch(&spec, &standard_factory()).await?;
  info!(nodes = ?pipeline.node_ids(), "pipeline running");

  sleep(Duration::from_secs(2)).await;
  pipeline.stop().await;

  let saved: Vec<_> = std::fs::read_dir(&output_dir)?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.file_name())
    .collect();
  info!(?saved, "frames written");
  Ok(())
}
