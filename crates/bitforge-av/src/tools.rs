//! External tool detection and management.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// External programs the ingestion pipeline shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Container runtime hosting the conversion service.
    Docker,
    /// Video metadata probe.
    Ffprobe,
    /// Preview frame extraction.
    Ffmpeg,
}

impl Tool {
    /// Every tool the pipeline may need.
    pub const ALL: [Tool; 3] = [Tool::Docker, Tool::Ffprobe, Tool::Ffmpeg];

    /// Executable name looked up on `PATH`.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Docker => "docker",
            Tool::Ffprobe => "ffprobe",
            Tool::Ffmpeg => "ffmpeg",
        }
    }

    /// Argument that makes the tool print its version.
    fn version_arg(&self) -> &'static str {
        match self {
            Tool::Docker => "--version",
            Tool::Ffprobe | Tool::Ffmpeg => "-version",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// A configured path takes precedence over a `PATH` lookup.
///
/// # Example
///
/// ```no_run
/// use bitforge_av::{check_tool, Tool};
///
/// let info = check_tool(Tool::Ffprobe, None);
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(tool: Tool, configured: Option<&Path>) -> ToolInfo {
    let unavailable = ToolInfo {
        name: tool.binary_name().to_string(),
        available: false,
        version: None,
        path: None,
    };

    let Ok(path) = get_tool_path(tool, configured) else {
        return unavailable;
    };

    match Command::new(&path).arg(tool.version_arg()).output() {
        Ok(output) if output.status.success() => ToolInfo {
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string()),
            path: Some(path),
            available: true,
            ..unavailable
        },
        _ => unavailable,
    }
}

/// Check every tool the pipeline uses.
///
/// `configured` yields an optional override path per tool.
pub fn check_tools<'a>(configured: impl Fn(Tool) -> Option<&'a Path>) -> Vec<ToolInfo> {
    Tool::ALL
        .iter()
        .map(|&tool| check_tool(tool, configured(tool)))
        .collect()
}

/// Require that a tool is available on `PATH`, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(tool: Tool) -> Result<PathBuf> {
    which::which(tool.binary_name()).map_err(|_| Error::tool_not_found(tool.binary_name()))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(tool: Tool, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "Configured path for {} does not exist: {}; falling back to PATH",
            tool,
            path.display()
        );
    }

    require_tool(tool)
}
