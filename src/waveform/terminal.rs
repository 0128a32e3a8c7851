// src/waveform/terminal.rs

use crate::waveform::ruler::RulerLayout;
use crate::waveform::Peaks;

const BLOCK: char = '█';
const PLAYHEAD: char = '│';

/// ASCII rendition of one track lane. `playhead` is a duration fraction.
pub fn render_lane(peaks: &Peaks, height: usize, playhead: Option<f64>) -> Vec<String> {
    let h = height.max(4);
    let width = peaks.len();
    let mut rows = vec![vec![' '; width]; h];
    let to_row = |v: f32| -> usize {
        let clamped = v.clamp(-1.0, 1.0);
        let y = (0.5 - 0.5 * clamped) * (h as f32 - 1.0);
        y.round() as usize
    };
    for x in 0..width {
        let top = to_row(peaks.maxs[x]);
        let bottom = to_row(peaks.mins[x]);
        let (a, b) = if top <= bottom { (top, bottom) } else { (bottom, top) };
        for row in rows.iter_mut().take(b + 1).skip(a) {
            row[x] = BLOCK;
        }
    }
    if let Some(col) = playhead_column(playhead, width) {
        for row in &mut rows {
            row[col] = PLAYHEAD;
        }
    }
    rows.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Bar numbers at their columns with `'` for beat ticks.
pub fn render_ruler(layout: &RulerLayout, width: usize) -> String {
    let mut row = vec![' '; width];
    for &x in &layout.beats {
        let col = x.floor() as usize;
        if col < width {
            row[col] = '\'';
        }
    }
    for bar in &layout.bars {
        let col = bar.x.floor() as usize;
        for (i, ch) in bar.number.to_string().chars().enumerate() {
            if col + i < width {
                row[col + i] = ch;
            }
        }
    }
    row.into_iter().collect()
}

fn playhead_column(fraction: Option<f64>, width: usize) -> Option<usize> {
    let f = fraction?;
    if width == 0 || !f.is_finite() {
        return None;
    }
    Some(((f.clamp(0.0, 1.0) * width as f64) as usize).min(width - 1))
}
