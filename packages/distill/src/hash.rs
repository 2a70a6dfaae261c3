//! Content hashing for change detection.
//!
//! Digests are SHA-256 over *normalized* text, so the same note saved with
//! CRLF line endings or stray trailing whitespace hashes identically on
//! every platform. This is change detection, not security.

use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Calculate the change-detection digest of note content.
///
/// Deterministic: the same content always yields the same lowercase-hex
/// SHA-256 digest, across process restarts and platforms.
pub fn content_hash(text: &str) -> String {
    let normalized = normalize(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Normalize text before hashing.
///
/// Folds CRLF and lone CR to LF, strips trailing whitespace from each
/// line, and trims trailing newlines. Returns the input unchanged (no
/// allocation) when it is already normalized.
pub fn normalize(text: &str) -> Cow<'_, str> {
    let needs_work = text.contains('\r')
        || text
            .lines()
            .any(|line| line.ends_with(' ') || line.ends_with('\t'))
        || text.ends_with('\n');

    if !needs_work {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for line in text.replace("\r\n", "\n").replace('\r', "\n").lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    while out.ends_with('\n') {
        out.pop();
    }
    Cow::Owned(out)
}
