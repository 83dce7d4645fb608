//! Topology configuration loading.
//!
//! A topology document is the JSON form of [`TopologySpec`]: a list of node
//! descriptors with `id`, `type`, `outputs`, and free-form `params`. A
//! missing file and a malformed document are distinct errors so operators
//! can tell a deployment problem from a config bug.

use std::path::Path;

use tracing::info;

use crate::error::FabricError;
use crate::topology::TopologySpec;

/// Loads a [`TopologySpec`] from a JSON file.
///
/// # Errors
///
/// `ConfigNotFound` when the file does not exist; `Serialization` when it
/// does not parse as a topology document.
pub fn load_topology(path: impl AsRef<Path>) -> Result<TopologySpec, FabricError> {
  let path = path.as_ref();
  if !path.exists() {
    return Err(FabricError::ConfigNotFound(path.display().to_string()));
  }
  let raw = std::fs::read_to_string(path)?;
  let spec: TopologySpec = serde_json::from_str(&raw)?;
  info!(path = %path.display(), nodes = spec.nodes.len(), "loaded topology config");
  Ok(spec)
}
