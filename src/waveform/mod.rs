// src/waveform/mod.rs
pub mod peaks;
pub mod ruler;
pub mod surface;
pub mod terminal;

pub use peaks::Peaks;
pub use ruler::{draw_ruler, RulerLayout};
pub use surface::{Color, DisplayList, DrawOp, Path, PathCmd, Surface, SurfaceSize};

use std::sync::Arc;

use crate::engine::AudioBuffer;

const BACKGROUND: Color = Color::rgba(0, 0, 0, 0.25);
const CENTER_LINE: Color = Color::rgba(255, 255, 255, 0.06);
const ENVELOPE_ALPHA: f32 = 0.85;
const AREA_ALPHA: f32 = 0.15;

/// Paints one track lane: background, center line, a min/max stroke per
/// column and a translucent area between the two envelopes.
///
/// Returns `false` without touching the surface when the target has no width.
pub fn draw_peaks(surface: &mut dyn Surface, peaks: &Peaks, color: Color, size: SurfaceSize) -> bool {
    let w = size.width.floor();
    if w < 1.0 {
        return false;
    }
    let h = size.height;
    let (bw, bh) = size.backing();
    surface.configure(bw, bh, size.device_pixel_ratio);

    surface.fill_rect(0.0, 0.0, w, h, BACKGROUND);
    surface.stroke_path(&Path::segment(0.0, h / 2.0, w, h / 2.0), CENTER_LINE, 1.0);

    let columns = (w as usize).min(peaks.len());
    if columns == 0 {
        return true;
    }
    let to_y = |v: f32| (1.0 + v as f64) / 2.0 * h;

    let mut envelope = Path::new();
    for i in 0..columns {
        let x = i as f64;
        envelope.move_to(x, to_y(peaks.mins[i]));
        envelope.line_to(x, to_y(peaks.maxs[i]));
    }
    surface.stroke_path(&envelope, color.with_alpha(ENVELOPE_ALPHA), 1.0);

    let mut area = Path::new();
    area.move_to(0.0, to_y(peaks.maxs[0]));
    for i in 1..columns {
        area.line_to(i as f64, to_y(peaks.maxs[i]));
    }
    for i in (0..columns).rev() {
        area.line_to(i as f64, to_y(peaks.mins[i]));
    }
    area.close();
    surface.fill_path(&area, color.with_alpha(AREA_ALPHA));

    true
}

/// Draws a decoded buffer through its peak cache, or placeholder peaks when
/// the buffer is not there yet.
pub fn draw_waveform(
    surface: &mut dyn Surface,
    buffer: Option<&AudioBuffer>,
    color: Color,
    size: SurfaceSize,
    placeholder_bins: usize,
) -> bool {
    let w = size.width.floor();
    if w < 1.0 {
        return false;
    }
    let peaks = match buffer {
        Some(b) => b.peaks(w as usize),
        None => Arc::new(Peaks::placeholder(placeholder_bins.max(1), w as usize, &mut rand::rng())),
    };
    draw_peaks(surface, &peaks, color, size)
}
