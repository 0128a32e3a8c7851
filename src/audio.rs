// src/audio.rs

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{error, info};

use crate::engine::{FrameClock, MixGraph};

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Finds the default audio output device and its config.
pub fn setup_output_device() -> anyhow::Result<OutputConfig> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;
    let supported_config = device
        .default_output_config()
        .context("querying default output config")?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    info!("Output device: {output_channels} channels @ {output_sample_rate} Hz ({sample_format:?})");

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Copies interleaved stereo into a device buffer of `channels` channels.
/// Mono devices get the average; channels past the second stay silent.
pub fn map_to_device<T>(stereo: &[f32], data: &mut [T], channels: usize)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let channels = channels.max(1);
    for (frame, lr) in data.chunks_mut(channels).zip(stereo.chunks_exact(2)) {
        let (l, r) = (lr[0], lr[1]);
        if channels == 1 {
            frame[0] = T::from_sample((l + r) * 0.5);
            continue;
        }
        frame[0] = T::from_sample(l);
        frame[1] = T::from_sample(r);
        for sample in frame.iter_mut().skip(2) {
            *sample = T::from_sample(0.0f32);
        }
    }
}

/// Output stream that pulls the mix from `graph` and moves `clock` forward
/// by every frame the device consumes, silence included.
pub fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    graph: Arc<Mutex<MixGraph>>,
    clock: FrameClock,
) -> anyhow::Result<Stream>
where
    T: SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::with_capacity(2048);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels.max(1);
            if scratch.len() != frames * 2 {
                scratch.resize(frames * 2, 0.0);
            }

            if let Ok(mut g) = graph.lock() {
                g.render(&mut scratch);
            } else {
                scratch.fill(0.0);
            }
            map_to_device(&scratch, data, channels);
            clock.advance(frames);
        },
        |err| error!("Output stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Dispatches [`build_stream`] on the device's native sample format.
pub fn build_stream_for(
    output: &OutputConfig,
    graph: Arc<Mutex<MixGraph>>,
    clock: FrameClock,
) -> anyhow::Result<Stream> {
    let (device, config) = (&output.device, &output.config);
    match output.sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, config, graph, clock),
        SampleFormat::I16 => build_stream::<i16>(device, config, graph, clock),
        SampleFormat::U16 => build_stream::<u16>(device, config, graph, clock),
        other => Err(anyhow!("unsupported sample format {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_stereo_onto_wider_device() {
        let stereo = [0.5, -0.5, 0.25, 0.75];
        let mut out = [9.0f32; 8];
        map_to_device(&stereo, &mut out, 4);
        assert_eq!(out, [0.5, -0.5, 0.0, 0.0, 0.25, 0.75, 0.0, 0.0]);
    }

    #[test]
    fn test_map_stereo_onto_mono_device() {
        let stereo = [0.5, -0.5, 0.25, 0.75];
        let mut out = [9.0f32; 2];
        map_to_device(&stereo, &mut out, 1);
        assert_eq!(out, [0.0, 0.5]);
    }

    #[test]
    fn test_map_to_integer_samples() {
        let stereo = [0.5, 0.0];
        let mut out = [7i16; 2];
        map_to_device(&stereo, &mut out, 2);
        assert!(out[0] > 16_000);
        assert_eq!(out[1], 0);
    }
}
