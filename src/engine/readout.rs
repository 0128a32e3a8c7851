// src/engine/readout.rs

use super::time::{format_clock, MusicalPosition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PitchDirection {
    Up,
    Down,
}

/// How far plain rate retiming moves the pitch.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchShift {
    pub cents: i32,
    /// `"+2.0 st"`, `"-1.5 st"`, or empty when there is no audible shift.
    pub label: String,
    pub direction: Option<PitchDirection>,
}

impl PitchShift {
    pub fn from_ratio(ratio: f64) -> Self {
        let cents = if ratio.is_finite() && ratio > 0.0 {
            (1200.0 * ratio.log2()).round() as i32
        } else {
            0
        };
        let semitones = cents as f64 / 100.0;
        let magnitude = format!("{:.1}", semitones.abs());
        if magnitude == "0.0" {
            return Self { cents, label: String::new(), direction: None };
        }
        let (sign, direction) = if cents > 0 {
            ('+', PitchDirection::Up)
        } else {
            ('-', PitchDirection::Down)
        };
        Self {
            cents,
            label: format!("{sign}{magnitude} st"),
            direction: Some(direction),
        }
    }
}

impl Default for PitchShift {
    fn default() -> Self {
        Self::from_ratio(1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedState {
    Off,
    Beat,
    /// First beat of a bar.
    Accent,
}

/// Flashes once per beat boundary crossed.
#[derive(Clone, Debug)]
pub struct BeatLed {
    last_beat: Option<u64>,
    lit_until: f64,
    accent: bool,
    flash_secs: f64,
}

impl BeatLed {
    pub fn new(flash_secs: f64) -> Self {
        Self {
            last_beat: None,
            lit_until: f64::NEG_INFINITY,
            accent: false,
            flash_secs,
        }
    }

    /// Returns true when this call started a new flash.
    pub fn update(&mut self, position: &MusicalPosition, now: f64) -> bool {
        if self.last_beat == Some(position.total_beat) {
            return false;
        }
        self.last_beat = Some(position.total_beat);
        self.lit_until = now + self.flash_secs;
        self.accent = position.is_downbeat();
        true
    }

    pub fn state(&self, now: f64) -> LedState {
        if now >= self.lit_until {
            LedState::Off
        } else if self.accent {
            LedState::Accent
        } else {
            LedState::Beat
        }
    }

    pub fn reset(&mut self) {
        self.last_beat = None;
        self.lit_until = f64::NEG_INFINITY;
        self.accent = false;
    }
}

/// Everything the host displays next to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Readout {
    /// Fraction of the session duration, 0..=1.
    pub playhead: f64,
    pub time: String,
    pub bar_beat: String,
    /// Master meter, 0..=100.
    pub meter: f32,
    pub led: LedState,
}

impl Default for Readout {
    fn default() -> Self {
        Self {
            playhead: 0.0,
            time: format_clock(0.0),
            bar_beat: "1.1".to_string(),
            meter: 0.0,
            led: LedState::Off,
        }
    }
}
