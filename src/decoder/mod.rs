// src/decoder/mod.rs

pub mod dsp;
pub mod resample;

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::engine::AudioBuffer;

/// Decodes a whole encoded file held in memory.
///
/// More than two channels are folded to stereo. With `target_rate` set the
/// result is resampled to it, otherwise the file's own rate is kept.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>, target_rate: Option<u32>) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("unrecognised audio container")?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let track_id = track.id;
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("unsupported codec")?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut planar: Vec<Vec<f32>> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!("skipping corrupt packet: {msg}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let needs_new = sample_buf
            .as_ref()
            .is_none_or(|b| b.capacity() < decoded.capacity());
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let (samples, channels) = dsp::fold_to_stereo(buf.samples(), spec.channels.count());
        if planar.is_empty() {
            planar = vec![Vec::new(); channels];
        }
        if channels == planar.len() {
            dsp::append_interleaved(&samples, &mut planar);
        } else {
            debug!("dropping packet with {channels} channels, stream has {}", planar.len());
        }
    }

    if dsp::planar_len(&planar) == 0 || sample_rate == 0 {
        return Err(anyhow!("no audio frames decoded"));
    }

    let (planar, rate) = match target_rate {
        Some(dst) if dst != sample_rate => (resample::resample_planar(planar, sample_rate, dst)?, dst),
        _ => (planar, sample_rate),
    };
    Ok(AudioBuffer::new(rate, planar))
}

/// Lowercased extension of the last path segment of a URL or path.
pub fn extension_hint(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
