// src/engine/time.rs

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,   // beats per bar
    pub denominator: u32, // 8 means eighth-note beats
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { numerator: 4, denominator: 4 }
    }
}

impl TimeSignature {
    /// Parses `"N/D"`. Anything malformed, or with a zero part, is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (n, d) = text.trim().split_once('/')?;
        let numerator: u32 = n.trim().parse().ok()?;
        let denominator: u32 = d.trim().parse().ok()?;
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self { numerator, denominator })
    }

    pub fn parse_or_default(text: &str) -> Self {
        Self::parse(text).unwrap_or_default()
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }
}

/// One boundary on the beat grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    /// Buffer time in seconds.
    pub time: f64,
    pub is_bar_start: bool,
    /// 1-indexed bar this line belongs to.
    pub bar_number: u32,
}

/// Where a buffer-time position falls on the beat grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalPosition {
    /// 0-indexed beat counted from the start.
    pub total_beat: u64,
    /// 1-indexed.
    pub bar: u64,
    /// 1-indexed within the bar.
    pub beat: u32,
}

impl MusicalPosition {
    pub fn is_downbeat(&self) -> bool {
        self.beat == 1
    }

    pub fn label(&self) -> String {
        format!("{}.{}", self.bar, self.beat)
    }
}

/// Relates seconds to bars and beats for the ruler and the beat LED.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    pub bpm: f64,
    pub signature: TimeSignature,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            signature: TimeSignature::default(),
        }
    }
}

impl TempoMap {
    pub fn new(bpm: f64, numerator: u32, denominator: u32) -> Self {
        Self {
            bpm,
            signature: TimeSignature { numerator, denominator },
        }
    }

    /// 60/bpm, or 30/bpm when the beat unit is an eighth note.
    pub fn seconds_per_beat(&self) -> f64 {
        if self.signature.denominator == 8 {
            30.0 / self.bpm
        } else {
            60.0 / self.bpm
        }
    }

    pub fn seconds_per_bar(&self) -> f64 {
        self.seconds_per_beat() * self.signature.numerator as f64
    }

    pub fn total_bars(&self, duration: f64) -> u32 {
        if duration <= 0.0 {
            return 0;
        }
        (duration / self.seconds_per_bar()).ceil() as u32
    }

    pub fn position_at(&self, elapsed: f64) -> MusicalPosition {
        let total_beat = (elapsed.max(0.0) / self.seconds_per_beat()).floor() as u64;
        let per_bar = self.signature.numerator.max(1) as u64;
        MusicalPosition {
            total_beat,
            bar: total_beat / per_bar + 1,
            beat: (total_beat % per_bar) as u32 + 1,
        }
    }

    /// Every bar and beat boundary from 0 up to the end of the last bar that
    /// `duration` touches.
    pub fn grid_lines(&self, duration: f64) -> Vec<GridLine> {
        let total_bars = self.total_bars(duration);
        let per_bar = self.signature.numerator.max(1);
        let spb = self.seconds_per_beat();

        let mut lines = Vec::with_capacity((total_bars * per_bar + 1) as usize);
        // integer steps so there is no float accumulation drift
        for step in 0..=(total_bars * per_bar) {
            let bar_index = step / per_bar;
            lines.push(GridLine {
                time: step as f64 * spb,
                is_bar_start: step % per_bar == 0,
                bar_number: bar_index + 1,
            });
        }
        lines
    }
}

/// `M:SS.s`, rounded to the tenth.
pub fn format_clock(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rem = tenths % 600;
    format!("{}:{:02}.{}", minutes, rem / 10, rem % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_parse() {
        assert_eq!(TimeSignature::parse("3/4"), Some(TimeSignature { numerator: 3, denominator: 4 }));
        assert_eq!(TimeSignature::parse(" 6 / 8 "), Some(TimeSignature { numerator: 6, denominator: 8 }));
        assert_eq!(TimeSignature::parse("4"), None);
        assert_eq!(TimeSignature::parse("0/4"), None);
        assert_eq!(TimeSignature::parse_or_default("x/y"), TimeSignature::default());
    }

    #[test]
    fn test_bar_duration_rule() {
        for bpm in [20.0, 87.5, 120.0, 300.0] {
            for (n, d) in [(4, 4), (3, 4), (6, 8), (7, 8), (5, 2), (12, 16)] {
                let map = TempoMap::new(bpm, n, d);
                let beat = if d == 8 { 30.0 / bpm } else { 60.0 / bpm };
                assert!((map.seconds_per_bar() - n as f64 * beat).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_total_bars_is_ceiling() {
        let map = TempoMap::new(120.0, 4, 4); // 2s bars
        assert_eq!(map.total_bars(4.0), 2);
        assert_eq!(map.total_bars(4.01), 3);
        assert_eq!(map.total_bars(0.0), 0);
    }

    #[test]
    fn test_position_at() {
        let map = TempoMap::new(120.0, 4, 4);
        assert_eq!(map.position_at(0.0).label(), "1.1");
        assert_eq!(map.position_at(0.49).label(), "1.1");
        assert_eq!(map.position_at(0.5).label(), "1.2");
        assert_eq!(map.position_at(2.0).label(), "2.1");
        assert!(map.position_at(2.0).is_downbeat());

        let six_eight = TempoMap::new(120.0, 6, 8); // 0.25s beats
        assert_eq!(six_eight.position_at(1.5).label(), "2.1");
    }

    #[test]
    fn test_grid_lines() {
        let map = TempoMap::new(120.0, 3, 4);
        let lines = map.grid_lines(2.0); // 1.5s bars -> 2 bars
        assert_eq!(lines.len(), 7);
        let bars: Vec<u32> = lines.iter().filter(|l| l.is_bar_start).map(|l| l.bar_number).collect();
        assert_eq!(bars, vec![1, 2, 3]);
        assert!((lines[4].time - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00.0");
        assert_eq!(format_clock(2.04), "0:02.0");
        assert_eq!(format_clock(9.96), "0:10.0");
        assert_eq!(format_clock(75.25), "1:15.3");
        assert_eq!(format_clock(59.97), "1:00.0");
    }
}
