//! Path utilities for classifying bitstreams by extension.
//!
//! Classification is case-insensitive and looks only at the final extension,
//! so `archive.tar.gz` is classified by `gz`.

use crate::FileCategory;
use std::path::Path;

/// Extensions converted to the standard image format.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "jp2", "jpx", "png"];

/// Extensions treated as video.
const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Extensions copied verbatim.
const OTHER_EXTENSIONS: &[&str] = &[
    // archives
    "7z", "gz", "gzip", "tar", "tgz", "z", "zip",
    // text and markup
    "csv", "txt", "xml", "xsd", "xsl", "json", "odd", "rng",
    // office documents
    "doc", "docx", "pdf", "ppt", "pptx", "xls", "xlsx",
    // audio
    "mp3", "wav",
];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Classify a path into a [`FileCategory`].
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use bitforge_common::{paths::classify, FileCategory};
///
/// assert_eq!(classify(Path::new("scan.tif")), FileCategory::Image);
/// assert_eq!(classify(Path::new("clip.MP4")), FileCategory::Video);
/// assert_eq!(classify(Path::new("notes.pdf")), FileCategory::Other);
/// assert_eq!(classify(Path::new("binary.exe")), FileCategory::Unknown);
/// ```
pub fn classify(path: &Path) -> FileCategory {
    match lowercase_extension(path) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => FileCategory::Image,
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => FileCategory::Video,
        Some(ext) if OTHER_EXTENSIONS.contains(&ext.as_str()) => FileCategory::Other,
        _ => FileCategory::Unknown,
    }
}

/// The original extension including its leading dot, or an empty string.
///
/// The case of the extension is preserved.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

/// Get the list of video file extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Get the list of extensions copied without transformation.
#[must_use]
pub fn other_extensions() -> &'static [&'static str] {
    OTHER_EXTENSIONS
}
