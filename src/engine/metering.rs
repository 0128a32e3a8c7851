// src/engine/metering.rs

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::MeterConfig;

/// UI side of the master-bus tap. The audio thread pushes mono samples into
/// the ring, the frame loop drains them here and keeps the newest window.
pub struct MeterTap {
    consumer: HeapCons<f32>,
    window: VecDeque<f32>,
    size: usize,
    scratch: Vec<f32>,
}

impl MeterTap {
    pub fn new(consumer: HeapCons<f32>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            consumer,
            window: VecDeque::from(vec![0.0; size]),
            size,
            scratch: vec![0.0; 1024],
        }
    }

    /// Pulls everything the audio thread has written since the last call.
    pub fn drain(&mut self) {
        while self.consumer.occupied_len() > 0 {
            let n = self.consumer.pop_slice(&mut self.scratch);
            if n == 0 {
                break;
            }
            self.window.extend(self.scratch[..n].iter().copied());
        }
        while self.window.len() > self.size {
            self.window.pop_front();
        }
    }

    /// The newest `size` samples, oldest first.
    pub fn window(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }

    /// Forgets buffered audio, e.g. after stop.
    pub fn clear(&mut self) {
        self.consumer.clear();
        self.window.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// Byte frequency data in the style of a browser analyser node: Blackman
/// window, |X|/N magnitudes with exponential smoothing across calls, then
/// decibels mapped linearly onto 0..=255.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    scale: f32,
}

impl Analyser {
    pub fn new(config: &MeterConfig) -> Self {
        let n = config.fft_size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        Self {
            fft,
            window: blackman(n),
            smoothed: vec![0.0; n / 2],
            buffer: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_db: config.min_db,
            max_db: config.max_db,
            scale: config.scale,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// `samples` shorter than the FFT are zero-padded at the front.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> Vec<u8> {
        let n = self.fft_size();
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();
        for i in 0..n {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            self.buffer[i] = Complex { re: s * self.window[i], im: 0.0 };
        }
        self.fft.process(&mut self.buffer);

        let min_db = self.min_db;
        let range = self.max_db - min_db;
        let k = self.smoothing;
        self.smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(prev, x)| {
                let mag = x.norm() / n as f32;
                *prev = k * *prev + (1.0 - k) * mag;
                let db = 20.0 * prev.log10();
                let scaled = (255.0 / range * (db - min_db)).floor();
                if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 }
            })
            .collect()
    }

    /// Master meter percentage for the given bins.
    pub fn level(&self, bytes: &[u8]) -> f32 {
        meter_level(bytes, self.scale)
    }
}

/// Mean bin value scaled so that 255 maps to `scale` percent, capped at 100.
pub fn meter_level(bytes: &[u8], scale: f32) -> f32 {
    if bytes.is_empty() {
        return 0.0;
    }
    let avg = bytes.iter().map(|&b| b as f32).sum::<f32>() / bytes.len() as f32;
    (avg / 255.0 * scale).min(100.0)
}

fn blackman(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42f32, 0.5f32, 0.08f32);
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
