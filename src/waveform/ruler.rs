// src/waveform/ruler.rs

use crate::engine::time::TempoMap;
use crate::waveform::surface::{Color, Path, Surface, SurfaceSize};

const BACKGROUND: Color = Color::rgb(0x16, 0x1b, 0x22);
const SIGNATURE_TEXT: Color = Color::rgba(255, 255, 255, 0.35);
const BAR_TEXT: Color = Color::rgb(0x88, 0x88, 0x88);
const BAR_LINE: Color = Color::rgba(255, 255, 255, 0.15);
const BEAT_TICK: Color = Color::rgba(255, 255, 255, 0.07);
const BEAT_TICK_HEIGHT: f64 = 8.0;
const TEXT_INSET: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BarMark {
    /// 1-indexed label.
    pub number: u32,
    pub x: f64,
}

/// Horizontal positions of everything the ruler draws, for a given width.
#[derive(Debug, Clone, PartialEq)]
pub struct RulerLayout {
    pub signature_label: String,
    pub beat_secs: f64,
    pub bar_secs: f64,
    pub total_bars: u32,
    /// One labelled line per bar start.
    pub bars: Vec<BarMark>,
    /// Boundary after the last bar; may sit past the right edge.
    pub end_x: f64,
    /// Interior beat ticks.
    pub beats: Vec<f64>,
}

impl RulerLayout {
    /// `None` when there is nothing to lay out yet.
    pub fn compute(tempo: &TempoMap, duration: f64, width: f64) -> Option<Self> {
        if duration <= 0.0 || !(tempo.bpm > 0.0) {
            return None;
        }
        let to_x = |t: f64| t * width / duration;
        let total_bars = tempo.total_bars(duration);

        let mut bars = Vec::with_capacity(total_bars as usize);
        let mut beats = Vec::new();
        let mut end_x = to_x(total_bars as f64 * tempo.seconds_per_bar());

        for line in tempo.grid_lines(duration) {
            if line.bar_number > total_bars {
                end_x = to_x(line.time);
            } else if line.is_bar_start {
                bars.push(BarMark { number: line.bar_number, x: to_x(line.time) });
            } else {
                beats.push(to_x(line.time));
            }
        }

        Some(Self {
            signature_label: tempo.signature.label(),
            beat_secs: tempo.seconds_per_beat(),
            bar_secs: tempo.seconds_per_bar(),
            total_bars,
            bars,
            end_x,
            beats,
        })
    }
}

/// Clears the ruler strip and, when there is audio, draws bar lines with
/// their numbers and lighter beat ticks.
pub fn draw_ruler(
    surface: &mut dyn Surface,
    tempo: &TempoMap,
    duration: f64,
    size: SurfaceSize,
) -> Option<RulerLayout> {
    let (bw, bh) = size.backing();
    surface.configure(bw, bh, size.device_pixel_ratio);
    surface.clear();
    let (w, h) = (size.width, size.height);
    surface.fill_rect(0.0, 0.0, w, h, BACKGROUND);

    let layout = RulerLayout::compute(tempo, duration, w)?;

    surface.fill_text(&layout.signature_label, TEXT_INSET, h - TEXT_INSET, SIGNATURE_TEXT);

    for bar in &layout.bars {
        surface.stroke_path(&Path::segment(bar.x, 0.0, bar.x, h), BAR_LINE, 1.0);
        surface.fill_text(&bar.number.to_string(), bar.x + 3.0, h - TEXT_INSET, BAR_TEXT);
    }
    surface.stroke_path(&Path::segment(layout.end_x, 0.0, layout.end_x, h), BAR_LINE, 1.0);

    if !layout.beats.is_empty() {
        let mut ticks = Path::new();
        for &x in &layout.beats {
            ticks.move_to(x, h - BEAT_TICK_HEIGHT);
            ticks.line_to(x, h);
        }
        surface.stroke_path(&ticks, BEAT_TICK, 1.0);
    }

    Some(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::surface::DisplayList;

    #[test]
    fn test_bar_count_matches_ceiling() {
        for (bpm, duration) in [(120.0, 4.0), (120.0, 4.2), (97.0, 31.3), (300.0, 0.1)] {
            let tempo = TempoMap::new(bpm, 4, 4);
            let layout = RulerLayout::compute(&tempo, duration, 800.0).unwrap();
            let expected = (duration / (4.0 * 60.0 / bpm)).ceil() as usize;
            assert_eq!(layout.bars.len(), expected);
            assert_eq!(layout.beats.len(), expected * 3);
        }
    }

    #[test]
    fn test_positions_are_duration_fractions() {
        // 3/4 at 120 -> 1.5s bars over 3s -> 2 bars
        let tempo = TempoMap::new(120.0, 3, 4);
        let layout = RulerLayout::compute(&tempo, 3.0, 600.0).unwrap();
        assert_eq!(layout.bars, vec![BarMark { number: 1, x: 0.0 }, BarMark { number: 2, x: 300.0 }]);
        assert_eq!(layout.beats, vec![100.0, 200.0, 400.0, 500.0]);
        assert_eq!(layout.end_x, 600.0);
    }

    #[test]
    fn test_eighth_note_signature() {
        let tempo = TempoMap::new(120.0, 6, 8);
        let layout = RulerLayout::compute(&tempo, 3.0, 300.0).unwrap();
        assert_eq!(layout.beat_secs, 0.25);
        assert_eq!(layout.bar_secs, 1.5);
        assert_eq!(layout.total_bars, 2);
    }

    #[test]
    fn test_draw_labels() {
        let mut dl = DisplayList::new();
        let tempo = TempoMap::new(120.0, 4, 4);
        let layout = draw_ruler(&mut dl, &tempo, 5.0, SurfaceSize::new(500.0, 28.0, 1.0)).unwrap();
        assert_eq!(layout.total_bars, 3);
        let texts: Vec<&str> = dl.texts().collect();
        assert_eq!(texts, vec!["4/4", "1", "2", "3"]);
    }

    #[test]
    fn test_empty_session_only_clears() {
        let mut dl = DisplayList::new();
        let tempo = TempoMap::default();
        assert!(draw_ruler(&mut dl, &tempo, 0.0, SurfaceSize::new(500.0, 28.0, 1.0)).is_none());
        assert_eq!(dl.texts().count(), 0);
        assert_eq!(dl.ops.len(), 3);
    }
}
