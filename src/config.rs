use std::path::Path;

use serde::{
  Deserialize, Serialize
};

use crate::error::HalaModelError;

fn default_as_true() -> bool {
  true
}

fn default_max_buffer_bytes() -> u64 {
  256 * 1024 * 1024
}

/// The model loading and storage options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalaModelConfig {
  /// Keep a CPU-side shadow copy of every buffer after upload.
  #[serde(default = "default_as_true")]
  pub keep_shadow_data: bool,
  /// Reject LOD distances that decrease with the LOD index.
  #[serde(default = "default_as_true")]
  pub validate_lod_distances: bool,
  /// The largest payload a stream may declare for a single buffer.
  #[serde(default = "default_max_buffer_bytes")]
  pub max_buffer_bytes: u64,
}

impl Default for HalaModelConfig {
  fn default() -> Self {
    Self {
      keep_shadow_data: true,
      validate_lod_distances: true,
      max_buffer_bytes: default_max_buffer_bytes(),
    }
  }
}

/// The implementation of the model config.
impl HalaModelConfig {
  /// Parse the config from a JSON string.
  /// param json: The JSON text.
  /// return: The config.
  pub fn from_json(json: &str) -> Result<Self, HalaModelError> {
    let config = serde_json::from_str(json)?;
    Ok(config)
  }

  /// Load the config from a JSON file.
  /// param path: The path to the JSON file.
  /// return: The config.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaModelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let config = Self::from_json(&text)?;
    log::debug!("Model config loaded from \"{:?}\".", path);
    Ok(config)
  }
}
