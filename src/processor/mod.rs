//! Per-file processor.
//!
//! Produces, for one input file, a byte-identical `.orig` copy, the
//! category-specific derivative and a JSON sidecar, all named after a fresh
//! [`InternalId`] inside a two-level sharded directory.

mod media;
mod sidecar;

pub use media::{FfmpegToolkit, VideoToolkit};
pub use sidecar::{SidecarMetadata, VideoMetadata};

use crate::service::{ConversionServiceManager, ExecOutcome, ServiceError};
use bitforge_common::checksum::sha256_file;
use bitforge_common::paths::{classify, dotted_extension};
use bitforge_common::{FileCategory, InternalId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Outcome for one file: the derivative path, or `None` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub original: PathBuf,
    pub derivative: Option<PathBuf>,
}

impl ProcessingResult {
    pub fn succeeded(original: impl Into<PathBuf>, derivative: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            derivative: Some(derivative.into()),
        }
    }

    pub fn failed(original: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            derivative: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.derivative.is_some()
    }
}

/// What the dispatcher gets back for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was handled, successfully or not
    Finished(ProcessingResult),
    /// The conversion service could not be reached; the file was not handled
    ServiceUnreachable { file: PathBuf, reason: String },
}

/// Why a single file could not be processed.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("File no longer exists")]
    NotFound,

    #[error("Unrecognized file extension")]
    UnknownCategory,

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion exited with code {code}")]
    Conversion { code: i32 },

    #[error("Conversion produced no output")]
    MissingOutput,

    #[error("Conversion service unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Media(#[from] bitforge_av::Error),

    #[error(transparent)]
    Checksum(#[from] bitforge_common::Error),

    #[error("Cannot compute frame rate for duration {duration}")]
    FrameRate { duration: f64 },
}

fn io_err(context: &'static str) -> impl FnOnce(std::io::Error) -> ProcessError {
    move |source| ProcessError::Io { context, source }
}

/// Directory holding every artifact of `id` below `output_root`.
pub fn shard_dir(output_root: &Path, id: &InternalId) -> PathBuf {
    output_root.join(id.shard()).join(id.sub_shard())
}

/// Creates derivatives for single files.
pub struct Processor {
    output_root: PathBuf,
    service: Arc<ConversionServiceManager>,
    media: Arc<dyn VideoToolkit>,
    derivative_extension: String,
}

impl Processor {
    pub fn new(
        output_root: impl Into<PathBuf>,
        service: Arc<ConversionServiceManager>,
        media: Arc<dyn VideoToolkit>,
        derivative_extension: impl Into<String>,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            service,
            media,
            derivative_extension: derivative_extension.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Process one file. Never panics on per-file problems; failures are
    /// logged with the file path and reported as a failed result.
    pub fn process(&self, file: &Path) -> FileOutcome {
        let id = InternalId::new();
        match self.process_with_id(file, &id) {
            Ok(derivative) => FileOutcome::Finished(ProcessingResult::succeeded(file, derivative)),
            Err(ProcessError::Unreachable(reason)) => {
                self.discard_artifacts(&id);
                FileOutcome::ServiceUnreachable {
                    file: file.to_path_buf(),
                    reason,
                }
            }
            Err(e) => {
                error!("Failed to process {:?}: {}", file, e);
                self.discard_artifacts(&id);
                FileOutcome::Finished(ProcessingResult::failed(file))
            }
        }
    }

    fn process_with_id(&self, file: &Path, id: &InternalId) -> Result<PathBuf, ProcessError> {
        if !file.is_file() {
            return Err(ProcessError::NotFound);
        }

        let token = id.as_token();
        let dir = shard_dir(&self.output_root, id);
        std::fs::create_dir_all(&dir).map_err(io_err("Failed to create output directory"))?;

        let extension = dotted_extension(file);
        let original_copy = dir.join(format!("{}{}.orig", token, extension));
        std::fs::copy(file, &original_copy).map_err(io_err("Failed to copy original"))?;

        let category = classify(file);
        debug!("{:?} is {} ({})", file, category, token);

        let (derivative, video) = match category {
            FileCategory::Unknown => return Err(ProcessError::UnknownCategory),
            FileCategory::Other => {
                let derivative = dir.join(format!("{}{}", token, extension));
                std::fs::copy(file, &derivative).map_err(io_err("Failed to copy derivative"))?;
                (derivative, None)
            }
            FileCategory::Image => {
                let derivative = dir.join(format!("{}.{}", token, self.derivative_extension));
                self.convert_image(file, &derivative)?;
                (derivative, None)
            }
            FileCategory::Video => {
                let derivative = dir.join(format!("{}{}", token, extension));
                std::fs::copy(file, &derivative).map_err(io_err("Failed to copy derivative"))?;
                let video = self.describe_video(file, &dir.join(format!("{}_keyframes", token)))?;
                (derivative, Some(video))
            }
        };

        let sidecar = SidecarMetadata {
            original_filename: file_name(file),
            checksum_original: sha256_file(file)?,
            checksum_derivative: sha256_file(&derivative)?,
            internal_filename: file_name(&derivative),
            original_internal_filename: file_name(&original_copy),
            video,
        };
        sidecar
            .write(&dir.join(format!("{}.info", token)))
            .map_err(io_err("Failed to write sidecar"))?;

        Ok(derivative)
    }

    fn convert_image(&self, input: &Path, output: &Path) -> Result<(), ProcessError> {
        match self.service.convert(input, output)? {
            ExecOutcome::Exited(0) if output.is_file() => Ok(()),
            ExecOutcome::Exited(0) => Err(ProcessError::MissingOutput),
            ExecOutcome::Exited(code) => Err(ProcessError::Conversion { code }),
            ExecOutcome::Unreachable(reason) => Err(ProcessError::Unreachable(reason)),
        }
    }

    fn describe_video(&self, input: &Path, frames_dir: &Path) -> Result<VideoMetadata, ProcessError> {
        let info = self.media.probe(input)?;
        let fps = info.fps().ok_or(ProcessError::FrameRate {
            duration: info.duration,
        })?;

        let frames = self.media.extract_preview_frames(input, frames_dir)?;
        debug!("Extracted {} preview frames from {:?}", frames, input);

        Ok(VideoMetadata {
            width: info.width,
            height: info.height,
            duration: info.duration,
            fps,
        })
    }

    /// Remove the artifacts behind a successful result that will not be
    /// recorded.
    pub fn discard(&self, result: &ProcessingResult) {
        let Some(derivative) = result.derivative.as_deref() else {
            return;
        };
        let id = derivative
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.get(..32))
            .and_then(InternalId::from_token)
            .filter(|id| derivative.starts_with(shard_dir(&self.output_root, id)));
        match id {
            Some(id) => {
                debug!("Discarding artifacts of {:?}", result.original);
                self.discard_artifacts(&id);
            }
            None => warn!("{:?} is not an artifact of this processor", derivative),
        }
    }

    /// Best-effort removal of everything written for `id`.
    fn discard_artifacts(&self, id: &InternalId) {
        let dir = shard_dir(&self.output_root, id);
        let token = id.as_token();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return;
        };
        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(&token) {
                continue;
            }
            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = result {
                debug!("Could not remove {:?}: {}", path, e);
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
