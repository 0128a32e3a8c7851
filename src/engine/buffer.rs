// src/engine/buffer.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::waveform::Peaks;

/// Decoded PCM for one stem.
///
/// Samples are planar and never change after construction, which is what
/// makes the per-width peak cache safe to share with the audio thread.
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
    peak_cache: Mutex<HashMap<usize, Arc<Peaks>>>,
}

impl AudioBuffer {
    /// All channels are truncated to the shortest one.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
            peak_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (c, &s) in frame.iter().enumerate() {
                planar[c].push(s);
            }
        }
        Self::new(sample_rate, planar)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native duration in seconds (buffer time).
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.channels.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Linear interpolation between neighbouring frames. Reads past the end are silence.
    #[inline]
    pub fn sample_at(&self, channel: usize, position: f64) -> f32 {
        let data = self.channel(channel);
        if position < 0.0 {
            return 0.0;
        }
        let i = position.floor() as usize;
        let Some(&a) = data.get(i) else {
            return 0.0;
        };
        let b = data.get(i + 1).copied().unwrap_or(0.0);
        let frac = (position - i as f64) as f32;
        a + (b - a) * frac
    }

    /// Min/max of the first channel for `pixel_width` columns, memoized per width.
    pub fn peaks(&self, pixel_width: usize) -> Arc<Peaks> {
        if let Ok(cache) = self.peak_cache.lock() {
            if let Some(p) = cache.get(&pixel_width) {
                return p.clone();
            }
        }

        let peaks = Arc::new(Peaks::from_samples(self.channel(0), pixel_width));

        if let Ok(mut cache) = self.peak_cache.lock() {
            // Another caller may have raced us; keep whichever landed first.
            return cache.entry(pixel_width).or_insert(peaks).clone();
        }
        peaks
    }

    pub fn cached_widths(&self) -> Vec<usize> {
        match self.peak_cache.lock() {
            Ok(cache) => {
                let mut widths: Vec<usize> = cache.keys().copied().collect();
                widths.sort_unstable();
                widths
            }
            Err(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels.len())
            .field("frames", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_splits_channels() {
        let buf = AudioBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 48_000);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn test_duration_in_buffer_time() {
        let buf = AudioBuffer::new(44_100, vec![vec![0.0; 44_100 * 4]]);
        assert!((buf.duration() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_at_interpolates_and_silences_past_end() {
        let buf = AudioBuffer::new(10, vec![vec![0.0, 1.0]]);
        assert!((buf.sample_at(0, 0.25) - 0.25).abs() < 1e-6);
        // last frame fades towards silence, beyond it nothing
        assert!((buf.sample_at(0, 1.5) - 0.5).abs() < 1e-6);
        assert_eq!(buf.sample_at(0, 2.0), 0.0);
        assert_eq!(buf.sample_at(3, 0.0), 0.0);
    }

    #[test]
    fn test_peaks_are_memoized_per_width() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
        let buf = AudioBuffer::new(1000, vec![samples]);

        let a = buf.peaks(100);
        let b = buf.peaks(100);
        let c = buf.peaks(50);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.len(), 50);
        assert_eq!(buf.cached_widths(), vec![50, 100]);
    }
}
