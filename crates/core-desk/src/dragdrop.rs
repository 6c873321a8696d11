//! Drag-and-drop ingestion filter.
//!
//! Only URL payloads are considered, and only those whose local-file
//! targets resolve to text content are accepted. Text-ness is decided by a
//! well-known extension or, failing that, a sniff of the first bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const TEXT_EXTENSIONS: &[&str] = &["txt", "log", "text", "md", "csv", "out", "err"];
const SNIFF_BYTES: usize = 512;

/// Filter dropped URLs down to the local text files newsroom can cover.
pub fn accepted_drops(urls: &[String]) -> Vec<PathBuf> {
    urls.iter()
        .filter_map(|url| local_target(url))
        .filter(|path| path.is_file() && is_text_file(path))
        .collect()
}

/// Resolve a dropped URL to a local path; non-file schemes are rejected.
fn local_target(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}

fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str())
        && TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    {
        return true;
    }
    sniff_text(path)
}

/// A file smells like text when its head decodes as UTF-8 without NULs.
fn sniff_text(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut head = [0u8; SNIFF_BYTES];
    let Ok(read) = file.read(&mut head) else {
        return false;
    };
    let head = &head[..read];
    if head.contains(&0) {
        return false;
    }
    // tolerate a cut-off multibyte sequence at the end of the sniff window
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.valid_up_to() + 4 >= head.len(),
    }
}
