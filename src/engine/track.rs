// src/engine/track.rs

use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::gain;

/// Where a track's audio is in its fetch/decode lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Ready,
    /// Holds the reason; the track stays silent and undrawn.
    Failed(String),
}

/// One stem of the session.
#[derive(Clone, Debug)]
pub struct Track {
    pub name: String,
    /// Resolved absolute location of the audio.
    pub source_url: String,
    pub buffer: Option<Arc<AudioBuffer>>,
    pub muted: bool,
    pub soloed: bool,
    /// 1.0 is unity, above 1.0 is boost.
    pub volume: f32,
    /// -1.0 left, 0 center, +1.0 right
    pub pan: f32,
    /// `#rrggbb` used for the lane.
    pub color: String,
    pub status: LoadStatus,
}

impl Track {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            buffer: None,
            muted: false,
            soloed: false,
            volume: 1.0,
            pan: 0.0,
            color: "#888888".to_string(),
            status: LoadStatus::Pending,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn attach_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.buffer = Some(buffer);
        self.status = LoadStatus::Ready;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.buffer = None;
        self.status = LoadStatus::Failed(reason.into());
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.is_some()
    }

    /// Buffer time; zero until decoded.
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    /// Slider percent (0..=150) to normalized volume.
    pub fn set_volume_percent(&mut self, percent: f32) {
        self.volume = percent.clamp(0.0, 150.0) / 100.0;
    }

    /// Slider value (-100..=100) to normalized pan.
    pub fn set_pan_percent(&mut self, percent: f32) {
        self.pan = percent.clamp(-100.0, 100.0) / 100.0;
    }

    pub fn volume_label(&self) -> String {
        gain::volume_label(self.volume)
    }

    pub fn pan_label(&self) -> String {
        gain::pan_label(self.pan)
    }
}
