// src/decoder/resample.rs

use anyhow::Result;
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::decoder::dsp;

const CHUNK_FRAMES: usize = 1024;

/// `None` when no conversion is needed.
pub fn build_resampler(
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 128usize;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let r = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels.max(1))?;
    Ok(Some(r))
}

/// Whole-buffer conversion of planar audio from `src_rate` to `dst_rate`.
///
/// The filter delay is trimmed from the front and the result is cut to the
/// length the new rate implies, so durations survive the trip.
pub fn resample_planar(planar: Vec<Vec<f32>>, src_rate: u32, dst_rate: u32) -> Result<Vec<Vec<f32>>> {
    let channels = planar.len();
    let Some(mut resampler) = build_resampler(src_rate, dst_rate, channels)? else {
        return Ok(planar);
    };

    let in_frames = dsp::planar_len(&planar);
    let expected = (in_frames as f64 * dst_rate as f64 / src_rate as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];
    let mut pos = 0usize;

    while in_frames - pos >= resampler.input_frames_next() {
        let need = resampler.input_frames_next();
        let block = dsp::planar_window(&planar, pos, need);
        append_planar(&mut out, resampler.process(&block, None)?);
        pos += need;
    }

    if pos < in_frames {
        let tail = dsp::planar_window(&planar, pos, in_frames - pos);
        append_planar(&mut out, resampler.process_partial(Some(tail.as_slice()), None)?);
    }

    // flush the delay line until we have everything we expect
    while dsp::planar_len(&out) < expected + delay {
        let flushed = resampler.process_partial::<&[f32]>(None, None)?;
        if dsp::planar_len(&flushed) == 0 {
            break;
        }
        append_planar(&mut out, flushed);
    }

    for ch in &mut out {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }
    Ok(out)
}

fn append_planar(dst: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (d, b) in dst.iter_mut().zip(block) {
        d.extend_from_slice(&b);
    }
}
