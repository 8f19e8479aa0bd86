use crate::config::ToolsConfig;
use bitforge_av::{Tool, VideoInfo};
use std::path::{Path, PathBuf};
use tracing::warn;

/// External video tooling used for video derivatives.
pub trait VideoToolkit: Send + Sync {
    fn probe(&self, path: &Path) -> bitforge_av::Result<VideoInfo>;

    /// Write still frames for `input` into `out_dir`, returning how many.
    fn extract_preview_frames(&self, input: &Path, out_dir: &Path) -> bitforge_av::Result<usize>;
}

/// [`VideoToolkit`] backed by the ffprobe and ffmpeg executables.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl FfmpegToolkit {
    pub fn new(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Locate the tools from configuration or `PATH`.
    ///
    /// A missing tool only fails the video files that need it.
    pub fn discover(tools: &ToolsConfig) -> Self {
        let locate = |tool: Tool| {
            bitforge_av::get_tool_path(tool, tools.path_for(tool)).unwrap_or_else(|e| {
                warn!("{}; video files will fail", e);
                PathBuf::from(tool.binary_name())
            })
        };
        Self::new(locate(Tool::Ffprobe), locate(Tool::Ffmpeg))
    }
}

impl VideoToolkit for FfmpegToolkit {
    fn probe(&self, path: &Path) -> bitforge_av::Result<VideoInfo> {
        bitforge_av::probe_video(&self.ffprobe, path)
    }

    fn extract_preview_frames(&self, input: &Path, out_dir: &Path) -> bitforge_av::Result<usize> {
        bitforge_av::extract_preview_frames(&self.ffmpeg, input, out_dir)
    }
}
