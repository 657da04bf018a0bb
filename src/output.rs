//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output leads with what happened to the asset (its stored name and size),
//! with filesystem paths shown as indented context lines. Failures are shown
//! one message per line so a rejected upload lists every problem.
//!
//! # Output Format
//!
//! ## Ingest
//!
//! ```text
//! Holiday-Photo_3fa9c01b7d2e.jpg (1920x1080, 2.4 MB)
//!     Original: Holiday Photo.jpg
//!     Type: image/jpeg
//! ```
//!
//! ## Rebuild
//!
//! ```text
//! Rebuilding 3 thumbnails
//!     a_1.png: 300x300
//!     clip_2.mp4: skipped
//!     bad_3.png: failed (Invalid image: ...)
//! Rebuilt 1, skipped 1, failed 1
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::assets::{DeleteReport, ManipulateResult, RebuildEvent, RebuildSummary};
use crate::imaging::Dimensions;
use crate::ingest::{AssetMetadata, UploadErrors, VideoAsset};
use crate::video::VideoProbe;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above 1 KB.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.2}s")
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Ingest
// ============================================================================

pub fn format_ingest_output(meta: &AssetMetadata) -> Vec<String> {
    vec![
        format!(
            "{} ({}x{}, {})",
            meta.filename,
            meta.width,
            meta.height,
            format_bytes(meta.byte_size)
        ),
        format!("{}Original: {}", indent(1), meta.original_name),
        format!("{}Type: {}", indent(1), meta.mime_type),
    ]
}

pub fn print_ingest_output(meta: &AssetMetadata) {
    print_lines(format_ingest_output(meta));
}

pub fn format_video_ingest_output(video: &VideoAsset) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", video.filename, format_bytes(video.byte_size))];
    lines.push(format!("{}Original: {}", indent(1), video.original_name));
    lines.push(format!("{}Type: {}", indent(1), video.mime_type));
    lines.extend(
        format_probe(&video.probe)
            .into_iter()
            .map(|l| format!("{}{}", indent(1), l)),
    );
    lines.push(format!(
        "{}Thumbnail: {}",
        indent(1),
        if video.thumbnail {
            "extracted"
        } else {
            "none (placeholder)"
        }
    ));
    lines
}

pub fn print_video_ingest_output(video: &VideoAsset) {
    print_lines(format_video_ingest_output(video));
}

/// One line per collected upload error.
pub fn format_upload_errors(errors: &UploadErrors) -> Vec<String> {
    let mut lines = vec!["Upload rejected".to_string()];
    lines.extend(
        errors
            .messages()
            .into_iter()
            .map(|m| format!("{}{}", indent(1), m)),
    );
    lines
}

pub fn print_upload_errors(errors: &UploadErrors) {
    for line in format_upload_errors(errors) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Manipulate / revert / delete
// ============================================================================

pub fn format_manipulate_output(result: &ManipulateResult) -> Vec<String> {
    vec![format!(
        "{}: {} \u{2192} {}x{}",
        result.filename, result.operation, result.width, result.height
    )]
}

pub fn print_manipulate_output(result: &ManipulateResult) {
    print_lines(format_manipulate_output(result));
}

/// Videos carry no dimensions.
pub fn format_revert_output(filename: &str, dims: Option<&Dimensions>) -> Vec<String> {
    match dims {
        Some(dims) => vec![format!(
            "{filename}: reverted to pristine ({}x{})",
            dims.width, dims.height
        )],
        None => vec![format!("{filename}: reverted to pristine")],
    }
}

pub fn print_revert_output(filename: &str, dims: Option<&Dimensions>) {
    print_lines(format_revert_output(filename, dims));
}

pub fn format_delete_output(report: &DeleteReport) -> Vec<String> {
    let status = if report.success() {
        "deleted"
    } else {
        "partially deleted"
    };
    let mut lines = vec![format!("{}: {}", report.filename, status)];
    for path in &report.removed {
        lines.push(format!("{}Removed: {}", indent(1), path.display()));
    }
    for path in &report.missing {
        lines.push(format!("{}Missing: {}", indent(1), path.display()));
    }
    for message in report.messages() {
        lines.push(format!("{}{}", indent(1), message));
    }
    lines
}

pub fn print_delete_output(report: &DeleteReport) {
    print_lines(format_delete_output(report));
}

// ============================================================================
// Rebuild
// ============================================================================

/// Format a single rebuild progress event as display lines.
pub fn format_rebuild_event(event: &RebuildEvent) -> Vec<String> {
    match event {
        RebuildEvent::Started { total } => vec![format!("Rebuilding {} thumbnails", total)],
        RebuildEvent::Rebuilt {
            filename,
            width,
            height,
        } => vec![format!("{}{}: {}x{}", indent(1), filename, width, height)],
        RebuildEvent::Skipped { filename } => vec![format!("{}{}: skipped", indent(1), filename)],
        RebuildEvent::Failed { filename, error } => {
            vec![format!("{}{}: failed ({})", indent(1), filename, error)]
        }
    }
}

pub fn format_rebuild_summary(summary: &RebuildSummary) -> Vec<String> {
    vec![format!(
        "Rebuilt {}, skipped {}, failed {}",
        summary.rebuilt, summary.skipped, summary.failed
    )]
}

pub fn print_rebuild_summary(summary: &RebuildSummary) {
    print_lines(format_rebuild_summary(summary));
}

// ============================================================================
// Video
// ============================================================================

/// Probe fields, `unknown` where the toolkit could not tell.
pub fn format_probe(probe: &VideoProbe) -> Vec<String> {
    let duration = probe
        .duration_seconds
        .map(format_seconds)
        .unwrap_or_else(|| "unknown".to_string());
    let size = match (probe.width, probe.height) {
        (Some(w), Some(h)) => format!("{w}x{h}"),
        _ => "unknown".to_string(),
    };
    vec![format!("Duration: {duration}"), format!("Size: {size}")]
}

pub fn print_probe(path: &std::path::Path, available: bool, probe: &VideoProbe) {
    println!("{}", path.display());
    if !available {
        println!("{}Video toolkit: not found", indent(1));
    }
    for line in format_probe(probe) {
        println!("{}{}", indent(1), line);
    }
}

// ============================================================================
// Tests
// ============================================================================
