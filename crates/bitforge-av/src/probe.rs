//! FFprobe-based video probing.
//!
//! Only the first video stream is inspected; the fields extracted are the
//! ones recorded in a video sidecar: width, height, duration, frame count.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Video attributes recorded in the sidecar of a video derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Duration in seconds.
    pub duration: f64,
    /// Number of frames in the video stream.
    pub frame_count: u64,
}

impl VideoInfo {
    /// Frames per second, `frame_count / duration`.
    ///
    /// `None` when the duration is zero, negative, or not finite.
    pub fn fps(&self) -> Option<f64> {
        frames_per_second(self.frame_count, self.duration)
    }
}

/// Compute `frame_count / duration`, or `None` when the duration cannot be divided by.
pub fn frames_per_second(frame_count: u64, duration: f64) -> Option<f64> {
    if duration.is_finite() && duration > 0.0 {
        Some(frame_count as f64 / duration)
    } else {
        None
    }
}

/// Probe a video file with the given ffprobe executable.
pub fn probe_video(ffprobe: &Path, path: &Path) -> Result<VideoInfo> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,duration,nb_frames:format=duration",
            "-print_format",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_output(path, &json_str)
}

fn parse_ffprobe_output(path: &Path, json_str: &str) -> Result<VideoInfo> {
    let output: FfprobeOutput = serde_json::from_str(json_str)?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| Error::invalid_probe(path, "no video stream"))?;

    // Containers such as MKV only report duration on the format.
    let duration = stream
        .duration
        .or_else(|| output.format.and_then(|f| f.duration))
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::invalid_probe(path, "missing duration"))?;

    let frame_count = stream
        .nb_frames
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::invalid_probe(path, "missing frame count"))?;

    Ok(VideoInfo {
        width: stream
            .width
            .ok_or_else(|| Error::invalid_probe(path, "missing width"))?,
        height: stream
            .height
            .ok_or_else(|| Error::invalid_probe(path, "missing height"))?,
        duration,
        frame_count,
    })
}
