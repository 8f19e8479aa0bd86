//! Core type definitions shared across the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a bitstream, derived purely from its file extension.
///
/// `Unknown` is a distinguishable failure state: the extension is recognized
/// by none of the category lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileCategory {
    /// Still image, converted by the conversion service.
    Image,
    /// Moving image, copied and probed.
    Video,
    /// Any other supported asset, copied verbatim.
    Other,
    /// Unsupported extension.
    Unknown,
}

impl FileCategory {
    /// Whether files of this category need the conversion service.
    pub fn needs_conversion_service(&self) -> bool {
        matches!(self, Self::Image)
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "IMAGE"),
            Self::Video => write!(f, "VIDEO"),
            Self::Other => write!(f, "OTHER"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
