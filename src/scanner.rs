//! Manifest scanner.
//!
//! Extracts the de-duplicated set of bitstream references from an XML
//! manifest. Every element whose tag name ends with the configured marker
//! (for example `<bitstream>` or `<ns:image-bitstream>`) contributes its text
//! as a file path.

use bitforge_common::{Error, Result};
use path_clean::PathClean;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Scan a manifest file and return every referenced path.
///
/// Relative references are resolved against `input_root`. References that
/// do not exist on disk are logged and kept, so they end up unprocessed.
pub fn scan(manifest: &Path, input_root: &Path, marker: &str) -> Result<BTreeSet<PathBuf>> {
    let content = std::fs::read_to_string(manifest)
        .map_err(|e| Error::manifest(format!("Cannot read {:?}: {}", manifest, e)))?;

    let references = parse_manifest(&content, marker)?;
    let total = references.len();

    let mut paths = BTreeSet::new();
    for reference in references {
        let path = resolve_reference(&reference, input_root);
        if !path.is_file() {
            warn!("Referenced file does not exist: {:?}", path);
        }
        paths.insert(path);
    }

    if paths.len() < total {
        debug!("Collapsed {} duplicate references", total - paths.len());
    }
    info!("Manifest {:?} references {} files", manifest, paths.len());

    Ok(paths)
}

/// Collect the raw text of all marker elements, in document order.
pub fn parse_manifest(xml: &str, marker: &str) -> Result<Vec<String>> {
    let marker = marker.to_lowercase();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut references = Vec::new();
    // Text of the marker element currently open, if any
    let mut current: Option<String> = None;
    let mut depth = 0usize;
    let mut marker_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if current.is_none() && is_marker(e.local_name().as_ref(), &marker) {
                    current = Some(String::new());
                    marker_depth = depth;
                }
            }
            Ok(Event::End(_)) => {
                if depth == marker_depth {
                    if let Some(text) = current.take() {
                        push_reference(&mut references, text);
                    }
                    marker_depth = 0;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Empty(e)) => {
                if is_marker(e.local_name().as_ref(), &marker) {
                    warn!(
                        "Ignoring empty <{}> element",
                        String::from_utf8_lossy(e.name().as_ref())
                    );
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(ref mut text) = current {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| Error::manifest(format!("Invalid text: {}", e)))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(ref mut text) = current {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::manifest(format!("Malformed XML: {}", e))),
        }
    }

    Ok(references)
}

fn is_marker(local_name: &[u8], marker: &str) -> bool {
    String::from_utf8_lossy(local_name)
        .to_lowercase()
        .ends_with(marker)
}

fn push_reference(references: &mut Vec<String>, text: String) {
    let text = text.trim();
    if text.is_empty() {
        warn!("Ignoring bitstream element without a path");
    } else {
        references.push(text.to_string());
    }
}

/// Resolve a manifest reference to a normalized path.
pub fn resolve_reference(reference: &str, input_root: &Path) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.clean()
    } else {
        input_root.join(path).clean()
    }
}
