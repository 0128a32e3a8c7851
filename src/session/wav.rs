// src/session/wav.rs

//! 16-bit PCM RIFF/WAVE encoding on top of hound.
//!
//! Mono and stereo mixes come out with the canonical 44-byte header
//! (`RIFF`, 16-byte `fmt ` chunk, `data`) followed by interleaved
//! little-endian samples.

use std::io::Cursor;

use anyhow::Context;
use hound::{SampleFormat, WavSpec, WavWriter};

pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Float sample to signed 16-bit. Clamped to [-1, 1], negatives scale by
/// 32768 and the rest by 32767 so both ends land exactly on the i16 range.
#[inline]
pub fn pcm16(sample: f32) -> i16 {
    let s = (sample as f64).clamp(-1.0, 1.0);
    if s < 0.0 { (s * 32768.0) as i16 } else { (s * 32767.0) as i16 }
}

/// Encodes planar channels. Shorter channels are padded with silence.
pub fn encode_wav(channels: &[Vec<f32>], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let num_channels = channels.len().max(1);
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    let spec = WavSpec {
        channels: num_channels as u16,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + frames * num_channels * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut out), spec).context("writing WAV header")?;
        for i in 0..frames {
            for c in 0..num_channels {
                let s = channels.get(c).and_then(|ch| ch.get(i)).copied().unwrap_or(0.0);
                writer.write_sample(pcm16(s)).context("writing WAV samples")?;
            }
        }
        writer.finalize().context("finalizing WAV")?;
    }
    Ok(out)
}
