//! # bitforge-av
//!
//! External media tooling used by the bitforge ingestion pipeline.
//!
//! This crate provides functionality for:
//! - Discovering external tools (docker, ffprobe, ffmpeg)
//! - Probing video files for dimensions, duration, and frame count
//! - Extracting preview frames from video files
//! - Substituting `{variable}` placeholders in command templates
//!
//! ## Example
//!
//! ```no_run
//! use bitforge_av::{probe_video, Tool};
//! use std::path::Path;
//!
//! let ffprobe = bitforge_av::require_tool(Tool::Ffprobe)?;
//! let info = probe_video(&ffprobe, Path::new("/path/to/clip.mp4"))?;
//! if let Some(fps) = info.fps() {
//!     println!("{}x{} at {:.2} fps", info.width, info.height, fps);
//! }
//! # Ok::<(), bitforge_av::Error>(())
//! ```

mod error;
pub mod frames;
pub mod probe;
pub mod template;
pub mod tools;

// Re-exports
pub use error::{Error, Result};
pub use frames::extract_preview_frames;
pub use probe::{frames_per_second, probe_video, VideoInfo};
pub use template::TemplateContext;
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, Tool, ToolInfo};
