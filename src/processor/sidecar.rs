use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata written next to every derivative as `<id>.info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMetadata {
    pub original_filename: String,
    pub checksum_original: String,
    pub checksum_derivative: String,
    pub internal_filename: String,
    pub original_internal_filename: String,
    #[serde(flatten)]
    pub video: Option<VideoMetadata>,
}

/// Video-only sidecar fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Seconds
    pub duration: f64,
    pub fps: f64,
}

impl SidecarMetadata {
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
