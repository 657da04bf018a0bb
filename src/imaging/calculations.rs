//! Pure calculation functions for image dimensions and encoder settings.
//!
//! All functions here are pure and testable without any I/O or images.
//! Rounding is round-half-up throughout (`f64::round` on non-negative values).

/// Calculate target dimensions for an aspect-preserving resize.
///
/// The requested box is shrunk along one axis so the result has the source
/// aspect ratio: if the box is relatively wider than the source, the width
/// is recomputed from the height; otherwise the height is recomputed from
/// the width.
///
/// # Examples
/// ```
/// # use gallery_media::imaging::calculations::calculate_aspect_dimensions;
/// // 400x300 into a 200x200 box → 200x150
/// assert_eq!(calculate_aspect_dimensions((400, 300), (200, 200)), (200, 150));
///
/// // 400x300 into a 400x100 box → 133x100
/// assert_eq!(calculate_aspect_dimensions((400, 300), (400, 100)), (133, 100));
/// ```
pub fn calculate_aspect_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let ratio = src_w as f64 / src_h as f64;
    let (w, h) = if tgt_w as f64 / tgt_h as f64 > ratio {
        (tgt_h as f64 * ratio, tgt_h as f64)
    } else {
        (tgt_w as f64, tgt_w as f64 / ratio)
    };

    (round_dimension(w), round_dimension(h))
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect >= tgt_aspect {
        // Source is wider (or equal): height will match, width will exceed
        let w = round_dimension(tgt_h as f64 * src_aspect);
        (w.max(tgt_w), tgt_h)
    } else {
        // Source is taller: width will match, height will exceed
        let h = round_dimension(tgt_w as f64 / src_aspect);
        (tgt_w, h.max(tgt_h))
    }
}

/// Offset that centers `extent` inside `parent`: `round((parent - extent) / 2)`.
pub fn center_offset(parent: u32, extent: u32) -> u32 {
    (parent.saturating_sub(extent) as f64 / 2.0).round() as u32
}

/// Bounding box of a `width x height` rectangle rotated by `degrees`.
pub fn calculate_rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (width as f64, height as f64);
    (
        round_dimension(w * cos + h * sin),
        round_dimension(w * sin + h * cos),
    )
}

/// PNG compression level derived from an abstract 1–100 quality.
///
/// `level = round((100 - quality) / 10)` clamped to `0..=9`: higher quality
/// means less compression effort.
pub fn png_compression_level(quality: u32) -> u8 {
    let level = (100u32.saturating_sub(quality) as f64 / 10.0).round();
    level.clamp(0.0, 9.0) as u8
}

/// Round to the nearest pixel, never below one.
fn round_dimension(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
