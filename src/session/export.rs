// src/session/export.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use log::{info, warn};

use crate::engine::gain::{effective_volume, pan_frame};
use crate::engine::{AudioBuffer, Track};
use crate::error::{Result, TransportError};
use crate::session::wav::encode_wav;

pub const WAV_MIME: &str = "audio/wav";

/// `stem_mix_<unix millis>.wav`
pub fn export_filename(unix_millis: i64) -> String {
    format!("stem_mix_{unix_millis}.wav")
}

struct MixdownVoice {
    buffer: Arc<AudioBuffer>,
    gain: f32,
    pan: f32,
}

/// Frozen copy of the mix at the moment export was asked for.
pub struct MixdownPlan {
    sample_rate: u32,
    frames: usize,
    master: f32,
    voices: Vec<MixdownVoice>,
}

impl MixdownPlan {
    /// Snapshots gain (after mute/solo) and pan of every decoded track.
    /// Playback rate plays no part: the mix is rendered in buffer time.
    pub fn snapshot(tracks: &[Track], duration: f64, master: f32) -> Result<Self> {
        let Some(first) = tracks.iter().find_map(|t| t.buffer.as_ref()) else {
            warn!("Export rejected: no stems loaded");
            return Err(TransportError::NoStemsLoaded);
        };
        let sample_rate = first.sample_rate();
        let any_soloed = tracks.iter().any(|t| t.soloed);
        let voices = tracks
            .iter()
            .filter_map(|t| {
                t.buffer.as_ref().map(|b| MixdownVoice {
                    buffer: b.clone(),
                    gain: effective_volume(t, any_soloed),
                    pan: t.pan,
                })
            })
            .collect();

        Ok(Self {
            sample_rate,
            frames: (duration.max(0.0) * sample_rate as f64).ceil() as usize,
            master,
            voices,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Two planar channels of `frames` samples.
    pub fn render(&self) -> Vec<Vec<f32>> {
        let mut left = vec![0.0f32; self.frames];
        let mut right = vec![0.0f32; self.frames];

        for v in &self.voices {
            if v.gain == 0.0 {
                continue;
            }
            let step = v.buffer.sample_rate() as f64 / self.sample_rate as f64;
            let stereo = v.buffer.channel_count() >= 2;
            let end = ((v.buffer.len() as f64 / step).ceil() as usize).min(self.frames);
            for i in 0..end {
                let pos = i as f64 * step;
                let a = v.buffer.sample_at(0, pos);
                let b = if stereo { v.buffer.sample_at(1, pos) } else { a };
                let (l, r) = pan_frame(v.pan, a * v.gain, b * v.gain, stereo);
                left[i] += l;
                right[i] += r;
            }
        }

        if self.master != 1.0 {
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s *= self.master;
            }
        }
        vec![left, right]
    }

    /// Renders and encodes in one go.
    pub fn run(self, filename: String) -> Result<ExportedMix> {
        info!("Mixdown: {} voices, {} frames @ {} Hz", self.voices.len(), self.frames, self.sample_rate);
        let channels = self.render();
        let bytes = encode_wav(&channels, self.sample_rate).map_err(|e| {
            warn!("Mixdown encode failed: {e:#}");
            TransportError::ExportFailed(format!("{e:#}"))
        })?;
        info!("Mixdown finished: {filename} ({} bytes)", bytes.len());
        Ok(ExportedMix { filename, mime: WAV_MIME, bytes })
    }
}

/// A finished mixdown, ready to hand to the user as a download.
#[derive(Debug, Clone)]
pub struct ExportedMix {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedMix {
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join(&self.filename);
        fs::write(&path, &self.bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Mixdown running off the calling thread. Resolves once.
pub struct MixdownJob {
    handle: Option<JoinHandle<Result<ExportedMix>>>,
}

impl MixdownJob {
    pub fn spawn(plan: MixdownPlan, filename: String) -> Self {
        let handle = thread::spawn(move || plan.run(filename));
        Self { handle: Some(handle) }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Blocks until the render is done.
    pub fn wait(mut self) -> Result<ExportedMix> {
        self.join()
    }

    /// The result if the render is done, `None` while it is still running
    /// or once it has been taken.
    pub fn try_take(&mut self) -> Option<Result<ExportedMix>> {
        if self.handle.as_ref()?.is_finished() {
            Some(self.join())
        } else {
            None
        }
    }

    fn join(&mut self) -> Result<ExportedMix> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| TransportError::ExportFailed("result already taken".into()))?;
        handle
            .join()
            .map_err(|_| TransportError::ExportFailed("render thread panicked".into()))?
    }
}
