// src/audio_runtime.rs

use std::sync::Arc;

use cpal::traits::StreamTrait;
use cpal::Stream;
use log::info;

use crate::audio::{build_stream_for, setup_output_device};
use crate::config::EditorConfig;
use crate::engine::{FrameClock, Transport};
use crate::loader::{DefaultFetcher, StemFetcher};

/// Owns the transport together with the device stream that renders it.
/// The stream runs for as long as the runtime lives; when nothing is
/// playing it renders silence and the clock keeps counting.
pub struct StemRuntime {
    transport: Transport,
    clock: FrameClock,
    device_channels: usize,
    _stream: Stream,
}

impl StemRuntime {
    /// Opens the default output device and fetches stems over http or from
    /// disk.
    pub fn new(config: EditorConfig) -> anyhow::Result<Self> {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::new()?))
    }

    pub fn with_fetcher(config: EditorConfig, fetcher: Arc<dyn StemFetcher>) -> anyhow::Result<Self> {
        let output = setup_output_device()?;
        let sample_rate = output.output_sample_rate;
        let clock = FrameClock::new(sample_rate);

        let transport = Transport::new(config, Arc::new(clock.clone()), sample_rate, fetcher);
        let stream = build_stream_for(&output, transport.graph(), clock.clone())?;
        stream.play()?;

        info!("Runtime up: {} Hz, {} device channels", sample_rate, output.output_channels);

        Ok(Self {
            transport,
            clock,
            device_channels: output.output_channels,
            _stream: stream,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn device_channels(&self) -> usize {
        self.device_channels
    }

    /// Frames the device has consumed since the stream opened.
    pub fn frames_rendered(&self) -> u64 {
        self.clock.frames()
    }
}

impl Drop for StemRuntime {
    fn drop(&mut self) {
        self.transport.close();
    }
}
