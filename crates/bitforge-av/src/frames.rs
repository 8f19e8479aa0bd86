//! Preview frame extraction with ffmpeg.

use crate::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Extract the key frames of `input` as PNG stills into `out_dir`.
///
/// The directory is created if absent. Returns the number of frames written.
///
/// # Errors
///
/// Fails if ffmpeg cannot be run, exits non-zero, or produces no frame.
pub fn extract_preview_frames(ffmpeg: &Path, input: &Path, out_dir: &Path) -> Result<usize> {
    if !input.exists() {
        return Err(Error::file_not_found(input));
    }
    std::fs::create_dir_all(out_dir)?;

    let pattern = out_dir.join("frame_%05d.png");
    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-nostdin", "-y", "-skip_frame", "nokey", "-i"])
        .arg(input)
        .args(["-vsync", "vfr"])
        .arg(&pattern)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffmpeg")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffmpeg", stderr.trim().to_string()));
    }

    let frames = count_frames(out_dir)?;
    if frames == 0 {
        return Err(Error::tool_failed(
            "ffmpeg",
            format!("no preview frame extracted from {}", input.display()),
        ));
    }

    tracing::debug!("Extracted {} preview frames from {:?}", frames, input);
    Ok(frames)
}

fn count_frames(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            count += 1;
        }
    }
    Ok(count)
}
