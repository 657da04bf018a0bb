//! Destination filenames for ingested uploads.
//!
//! Every stored asset is named `stem_suffix.ext`:
//! - `stem` is the uploader's file stem reduced to `[A-Za-z0-9_-]`
//! - `suffix` is 12 hex chars of SHA-256 over the clock, the process id, a
//!   process-wide counter and the stem
//! - `ext` is the declared extension, lowercased
//!
//! ```text
//! "Summer Trip (1).JPG"  →  "Summer-Trip-1_3fa9c01b7d2e.jpg"
//! "../../etc/passwd"     →  "etc-passwd_91b0e4d2aa10"
//! ```
//!
//! The suffix makes collisions unlikely; [`unique_filename`] makes them
//! impossible against the files that already exist.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Stem used when nothing usable survives sanitizing.
pub const FALLBACK_STEM: &str = "upload";

const SUFFIX_LEN: usize = 12;
const MAX_STEM_LEN: usize = 64;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reduce an uploaded name's stem to a filesystem-safe form.
///
/// Runs of disallowed characters collapse to a single `-`; leading and
/// trailing dashes are dropped.
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut pending_dash = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    let trimmed: String = out
        .trim_matches('-')
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed
    }
}

/// Lowercase the extension and keep only ASCII alphanumerics.
pub fn sanitize_extension(ext: &str) -> String {
    ext.trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Split an uploaded file name into `(stem, extension)`.
///
/// Only the final path component is considered, with either separator.
pub fn split_name(original_name: &str) -> (&str, &str) {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    match base.rfind('.') {
        Some(0) | None => (base, ""),
        Some(dot) => (&base[..dot], &base[dot + 1..]),
    }
}

/// Fresh random-looking suffix. Two calls never return the same value within
/// one process.
pub fn unique_suffix(stem: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(stem.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(SUFFIX_LEN);
    hex
}

/// Build `stem_suffix.ext`, drawing new suffixes until `exists` says the
/// name is free. An empty extension yields `stem_suffix`.
pub fn unique_filename(stem: &str, ext: &str, exists: impl Fn(&str) -> bool) -> String {
    let stem = sanitize_stem(stem);
    let ext = sanitize_extension(ext);
    loop {
        let suffix = unique_suffix(&stem);
        let candidate = if ext.is_empty() {
            format!("{stem}_{suffix}")
        } else {
            format!("{stem}_{suffix}.{ext}")
        };
        if !exists(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_stem("holiday_2024-01"), "holiday_2024-01");
    }

    #[test]
    fn sanitize_collapses_runs() {
        assert_eq!(sanitize_stem("Summer Trip (1)"), "Summer-Trip-1");
        assert_eq!(sanitize_stem("a   b"), "a-b");
    }

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_stem("../../etc/passwd"), "etc-passwd");
    }

    #[test]
    fn sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_stem(""), FALLBACK_STEM);
        assert_eq!(sanitize_stem("日本語"), FALLBACK_STEM);
        assert_eq!(sanitize_stem("---"), FALLBACK_STEM);
    }

    #[test]
    fn sanitize_truncates_long_stems() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_stem(&long).len(), MAX_STEM_LEN);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(sanitize_extension("JPG"), "jpg");
        assert_eq!(sanitize_extension(".Png"), "png");
        assert_eq!(sanitize_extension("we/bp"), "webp");
    }

    #[test]
    fn split_name_cases() {
        assert_eq!(split_name("photo.jpg"), ("photo", "jpg"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", "gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
        assert_eq!(split_name("C:\\Users\\me\\cat.png"), ("cat", "png"));
        assert_eq!(split_name("dir/sub/dog.gif"), ("dog", "gif"));
    }

    #[test]
    fn suffixes_are_distinct() {
        let suffixes: HashSet<String> = (0..500).map(|_| unique_suffix("same")).collect();
        assert_eq!(suffixes.len(), 500);
        assert!(suffixes.iter().all(|s| s.len() == SUFFIX_LEN));
    }

    #[test]
    fn unique_filename_shape() {
        let name = unique_filename("My Photo", "JPG", |_| false);
        assert!(name.starts_with("My-Photo_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), "My-Photo_".len() + SUFFIX_LEN + ".jpg".len());
    }

    #[test]
    fn unique_filename_without_extension() {
        let name = unique_filename("notes", "", |_| false);
        assert!(name.starts_with("notes_"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn unique_filename_retries_on_collision() {
        let calls = Cell::new(0);
        let name = unique_filename("clip", "mp4", |_| {
            calls.set(calls.get() + 1);
            calls.get() < 3
        });
        assert_eq!(calls.get(), 3);
        assert!(name.starts_with("clip_"));
    }
}
