// src/engine/gain.rs

use std::f32::consts::FRAC_PI_2;

use super::track::Track;

/// Loudness a track should have right now.
///
/// An explicit mute always wins. Otherwise, if any track is soloed, only the
/// soloed ones keep their volume.
pub fn effective_volume(track: &Track, any_soloed: bool) -> f32 {
    if track.muted {
        0.0
    } else if any_soloed && !track.soloed {
        0.0
    } else {
        track.volume
    }
}

pub fn any_soloed(tracks: &[Track]) -> bool {
    tracks.iter().any(|t| t.soloed)
}

/// Effective volume for every track, in track order.
pub fn effective_volumes(tracks: &[Track]) -> Vec<f32> {
    let solo = any_soloed(tracks);
    tracks.iter().map(|t| effective_volume(t, solo)).collect()
}

/// One-pole smoother towards a target, advanced per sample.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    value: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    /// `time_constant` in seconds; zero means changes apply instantly.
    pub fn new(initial: f32, time_constant: f64, sample_rate: u32) -> Self {
        let coeff = if time_constant > 0.0 && sample_rate > 0 {
            (-1.0 / (time_constant * sample_rate as f64)).exp() as f32
        } else {
            0.0
        };
        Self { value: initial, target: initial, coeff }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jumps straight to `value`.
    pub fn snap(&mut self, value: f32) {
        self.value = value;
        self.target = value;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn current(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        self.value = self.target + (self.value - self.target) * self.coeff;
        self.value
    }

    /// Same as calling `next` `frames` times.
    pub fn skip(&mut self, frames: usize) {
        let decay = self.coeff.powi(frames.min(i32::MAX as usize) as i32);
        self.value = self.target + (self.value - self.target) * decay;
    }
}

/// Equal-power stereo position.
///
/// Mono sources are spread across both sides; stereo sources keep their
/// near channel and fold the far one in as the position moves away.
#[inline]
pub fn pan_frame(pan: f32, left: f32, right: f32, stereo_source: bool) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if !stereo_source {
        let x = (pan + 1.0) * 0.5;
        let (g_l, g_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
        return (left * g_l, left * g_r);
    }
    if pan <= 0.0 {
        let x = pan + 1.0;
        let (g_l, g_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
        (left + right * g_l, right * g_r)
    } else {
        let x = pan;
        let (g_l, g_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
        (left * g_l, right + left * g_r)
    }
}

/// `"120%"`
pub fn volume_label(volume: f32) -> String {
    format!("{}%", (volume * 100.0).round() as i32)
}

/// `"C"`, `"L50"` or `"R30"`.
pub fn pan_label(pan: f32) -> String {
    let p = (pan.clamp(-1.0, 1.0) * 100.0).round() as i32;
    match p {
        0 => "C".to_string(),
        p if p < 0 => format!("L{}", -p),
        p => format!("R{}", p),
    }
}
