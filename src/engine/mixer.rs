// src/engine/mixer.rs

use std::sync::Arc;

use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapProd, HeapRb};

use super::buffer::AudioBuffer;
use super::gain::{pan_frame, SmoothedParam};
use super::metering::MeterTap;

/// Per-track gain → pan stage. Lives as long as the stem set.
pub struct ChannelStrip {
    gain: SmoothedParam,
    pan: SmoothedParam,
}

impl ChannelStrip {
    fn new(sample_rate: u32, smoothing_secs: f64) -> Self {
        Self {
            gain: SmoothedParam::new(1.0, smoothing_secs, sample_rate),
            pan: SmoothedParam::new(0.0, smoothing_secs, sample_rate),
        }
    }
}

/// One playback unit reading a decoded buffer at a variable rate.
/// Started once, never restarted; a new play cycle builds new voices.
pub struct Voice {
    buffer: Arc<AudioBuffer>,
    /// Read head in buffer frames.
    position: f64,
    rate: f64,
    /// Buffer frames per graph frame at rate 1.
    step_scale: f64,
    finished: bool,
}

impl Voice {
    fn new(buffer: Arc<AudioBuffer>, offset_secs: f64, rate: f64, graph_rate: u32) -> Self {
        let sr = buffer.sample_rate() as f64;
        let position = (offset_secs.max(0.0) * sr).min(buffer.len() as f64);
        let finished = position >= buffer.len() as f64;
        Self {
            step_scale: sr / graph_rate.max(1) as f64,
            buffer,
            position,
            rate,
            finished,
        }
    }

    pub fn position_secs(&self) -> f64 {
        self.position / self.buffer.sample_rate() as f64
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    fn read(&mut self) -> Option<(f32, f32, bool)> {
        if self.finished {
            return None;
        }
        let stereo = self.buffer.channel_count() >= 2;
        let l = self.buffer.sample_at(0, self.position);
        let r = if stereo { self.buffer.sample_at(1, self.position) } else { l };

        self.position += self.rate * self.step_scale;
        if self.position >= self.buffer.len() as f64 {
            self.finished = true;
        }
        Some((l, r, stereo))
    }
}

/// The master bus. Every track is summed through its strip, then the smoothed
/// master gain, then written out as interleaved stereo and copied (mono) to
/// the analyser tap.
pub struct MixGraph {
    sample_rate: u32,
    smoothing_secs: f64,
    strips: Vec<ChannelStrip>,
    voices: Vec<Option<Voice>>,
    master: SmoothedParam,
    tap: HeapProd<f32>,
    tap_scratch: Vec<f32>,
}

impl MixGraph {
    pub fn new(sample_rate: u32, smoothing_secs: f64, tap_window: usize) -> (Self, MeterTap) {
        let rb = HeapRb::<f32>::new(sample_rate.max(1) as usize / 4 + tap_window);
        let (producer, consumer) = rb.split();
        let graph = Self {
            sample_rate: sample_rate.max(1),
            smoothing_secs,
            strips: Vec::new(),
            voices: Vec::new(),
            master: SmoothedParam::new(1.0, smoothing_secs, sample_rate),
            tap: producer,
            tap_scratch: Vec::with_capacity(4096),
        };
        (graph, MeterTap::new(consumer, tap_window))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drops all voices and rebuilds `count` strips at unity/center.
    pub fn reset_strips(&mut self, count: usize) {
        self.strips = (0..count)
            .map(|_| ChannelStrip::new(self.sample_rate, self.smoothing_secs))
            .collect();
        self.voices = (0..count).map(|_| None).collect();
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    pub fn set_gain(&mut self, index: usize, gain: f32) {
        if let Some(s) = self.strips.get_mut(index) {
            s.gain.set_target(gain.max(0.0));
        }
    }

    pub fn set_pan(&mut self, index: usize, pan: f32) {
        if let Some(s) = self.strips.get_mut(index) {
            s.pan.set_target(pan.clamp(-1.0, 1.0));
        }
    }

    pub fn set_master(&mut self, gain: f32) {
        self.master.set_target(gain.max(0.0));
    }

    pub fn gain_target(&self, index: usize) -> Option<f32> {
        self.strips.get(index).map(|s| s.gain.target())
    }

    pub fn pan_target(&self, index: usize) -> Option<f32> {
        self.strips.get(index).map(|s| s.pan.target())
    }

    pub fn master_target(&self) -> f32 {
        self.master.target()
    }

    /// Starts every given source in one go. Anything still running is
    /// dropped first so no track ever has two voices.
    pub fn start_sources(&mut self, sources: Vec<(usize, Arc<AudioBuffer>, f64)>, rate: f64) {
        self.stop_sources();
        for (index, buffer, offset) in sources {
            if let Some(slot) = self.voices.get_mut(index) {
                *slot = Some(Voice::new(buffer, offset, rate, self.sample_rate));
            }
        }
    }

    /// Stops every voice, including ones that already ran off their buffer.
    /// Returns how many there were.
    pub fn stop_sources(&mut self) -> usize {
        self.voices.iter_mut().filter_map(Option::take).count()
    }

    /// Retimes the running voices in place.
    pub fn set_rate(&mut self, rate: f64) {
        for v in self.voices.iter_mut().flatten() {
            v.rate = rate;
        }
    }

    /// Live handles, finished or not.
    pub fn active_sources(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    /// Voices that still have audio left.
    pub fn sounding_sources(&self) -> usize {
        self.voices.iter().flatten().filter(|v| !v.finished).count()
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index).and_then(Option::as_ref)
    }

    /// Renders interleaved stereo into `out`.
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        self.tap_scratch.clear();

        if self.sounding_sources() == 0 {
            out.fill(0.0);
            for s in &mut self.strips {
                s.gain.skip(frames);
                s.pan.skip(frames);
            }
            self.master.skip(frames);
            self.tap_scratch.resize(frames, 0.0);
            self.tap.push_slice(&self.tap_scratch);
            return;
        }

        for frame in out.chunks_exact_mut(2) {
            let mut l = 0.0f32;
            let mut r = 0.0f32;
            for (strip, voice) in self.strips.iter_mut().zip(self.voices.iter_mut()) {
                let g = strip.gain.next();
                let p = strip.pan.next();
                let Some((a, b, stereo)) = voice.as_mut().and_then(Voice::read) else {
                    continue;
                };
                let (pl, pr) = pan_frame(p, a * g, b * g, stereo);
                l += pl;
                r += pr;
            }
            let m = self.master.next();
            frame[0] = l * m;
            frame[1] = r * m;
            self.tap_scratch.push((frame[0] + frame[1]) * 0.5);
        }

        // meter is best effort; a full ring just drops samples
        self.tap.push_slice(&self.tap_scratch);
    }
}
