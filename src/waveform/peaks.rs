// src/waveform/peaks.rs

use rand::Rng;

/// Per-column min/max envelope of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Peaks {
    pub mins: Vec<f32>,
    pub maxs: Vec<f32>,
}

impl Peaks {
    /// Splits `data` into `pixel_width` slices of `ceil(len / width)` samples
    /// and records the extremes of each. Slices that run past the end of the
    /// data read as silence.
    pub fn from_samples(data: &[f32], pixel_width: usize) -> Self {
        let mut mins = vec![0.0f32; pixel_width];
        let mut maxs = vec![0.0f32; pixel_width];
        if pixel_width == 0 || data.is_empty() {
            return Self { mins, maxs };
        }

        let step = data.len().div_ceil(pixel_width);
        for i in 0..pixel_width {
            let mut mn = 1.0f32;
            let mut mx = -1.0f32;
            let base = i * step;
            for j in 0..step {
                let v = data.get(base + j).copied().unwrap_or(0.0);
                if v < mn {
                    mn = v;
                }
                if v > mx {
                    mx = v;
                }
            }
            mins[i] = mn;
            maxs[i] = mx;
        }

        Self { mins, maxs }
    }

    /// Symmetric envelope from unsigned amplitudes, stretched to `pixel_width`.
    pub fn from_amplitudes(amplitudes: &[f32], pixel_width: usize) -> Self {
        let mut mins = Vec::with_capacity(pixel_width);
        let mut maxs = Vec::with_capacity(pixel_width);
        if amplitudes.is_empty() {
            return Self { mins: vec![0.0; pixel_width], maxs: vec![0.0; pixel_width] };
        }
        for x in 0..pixel_width {
            let idx = x * amplitudes.len() / pixel_width;
            let a = amplitudes[idx].clamp(0.0, 1.0);
            mins.push(-a);
            maxs.push(a);
        }
        Self { mins, maxs }
    }

    /// Stand-in envelope for a track whose audio has not decoded yet.
    pub fn placeholder<R: Rng + ?Sized>(bins: usize, pixel_width: usize, rng: &mut R) -> Self {
        let amplitudes: Vec<f32> = (0..bins)
            .map(|_| 0.1 + rng.random::<f32>() * 0.85)
            .collect();
        Self::from_amplitudes(&amplitudes, pixel_width)
    }

    pub fn len(&self) -> usize {
        self.mins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mins.is_empty()
    }
}
