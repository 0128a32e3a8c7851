// src/engine/transport.rs

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::EditorConfig;
use crate::error::{Result, TransportError};
use crate::loader::{resolve_url, LoadEvent, StemFetcher, StemLoader};
use crate::session::{export_filename, MixdownJob, MixdownPlan};
use crate::waveform::{self, Color, RulerLayout, Surface, SurfaceSize};

use super::buffer::AudioBuffer;
use super::clock::AudioClock;
use super::gain;
use super::metering::{Analyser, MeterTap};
use super::mixer::MixGraph;
use super::readout::{BeatLed, PitchShift, Readout};
use super::time::{format_clock, TempoMap, TimeSignature};
use super::track::{LoadStatus, Track};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// New `started_at` that keeps the buffer position continuous when the rate
/// changes at `now`: `(now - old) * old_ratio == (now - new) * new_ratio`.
pub fn rebase_clock(now: f64, started_at: f64, old_ratio: f64, new_ratio: f64) -> f64 {
    let position = (now - started_at) * old_ratio;
    now - position / new_ratio
}

/// Multi-stem player for one editor session.
///
/// All tracks play through one `MixGraph` at a single shared ratio. The
/// host calls [`Transport::poll`] once per display frame; that is where
/// finished decodes are applied, the end-of-track timer fires and the
/// readouts are refreshed.
pub struct Transport {
    config: EditorConfig,
    clock: Arc<dyn AudioClock>,
    graph: Arc<Mutex<MixGraph>>,
    tap: MeterTap,
    analyser: Analyser,
    loader: StemLoader,
    generation: u64,

    tracks: Vec<Track>,
    original_bpm: f64,
    tempo: TempoMap,
    playback_ratio: f64,
    duration: f64,
    master_volume: f32,

    state: TransportState,
    looping: bool,
    started_at: f64,
    pause_offset: f64,
    end_deadline: Option<f64>,
    frame_loop: bool,

    led: BeatLed,
    readout: Readout,
    pitch: PitchShift,
}

impl Transport {
    /// `sample_rate` is the rate the graph renders at; stems are decoded to it.
    pub fn new(
        config: EditorConfig,
        clock: Arc<dyn AudioClock>,
        sample_rate: u32,
        fetcher: Arc<dyn StemFetcher>,
    ) -> Self {
        let (graph, tap) = MixGraph::new(sample_rate, config.transport.smoothing_secs, config.meter.fft_size);
        let analyser = Analyser::new(&config.meter);
        let tempo = TempoMap {
            bpm: config.tempo.fallback_bpm(),
            signature: TimeSignature::parse_or_default(&config.tempo.default_time_signature),
        };
        Self {
            clock,
            graph: Arc::new(Mutex::new(graph)),
            tap,
            analyser,
            loader: StemLoader::new(fetcher, Some(sample_rate)),
            generation: 0,
            tracks: Vec::new(),
            original_bpm: tempo.bpm,
            tempo,
            playback_ratio: 1.0,
            duration: 0.0,
            master_volume: 1.0,
            state: TransportState::Stopped,
            looping: false,
            started_at: 0.0,
            pause_offset: 0.0,
            end_deadline: None,
            frame_loop: false,
            led: BeatLed::new(config.transport.beat_flash_secs),
            readout: Readout::default(),
            pitch: PitchShift::default(),
            config,
        }
    }

    /// Handle for the audio callback.
    pub fn graph(&self) -> Arc<Mutex<MixGraph>> {
        self.graph.clone()
    }

    // --- session -----------------------------------------------------------

    /// Replaces the stem set and starts fetching every stem in the
    /// background. `bpm` becomes the reference tempo for retiming.
    pub fn load_stems<I, N, U>(&mut self, stems: I, bpm: f64, signature: &str)
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: AsRef<str>,
    {
        let stems: Vec<(String, String)> = stems
            .into_iter()
            .map(|(n, u)| (n.into(), resolve_url(&self.config.api_base, u.as_ref())))
            .collect();
        self.begin_session(stems.iter().map(|(n, u)| (n.clone(), u.clone())).collect(), bpm, signature);

        for (index, (name, url)) in stems.into_iter().enumerate() {
            self.loader.spawn(self.generation, index, name, url);
        }
    }

    /// Same as [`Transport::load_stems`] for audio that is already decoded.
    pub fn load_buffers(&mut self, stems: Vec<(String, Arc<AudioBuffer>)>, bpm: f64, signature: &str) {
        let names = stems.iter().map(|(n, _)| (n.clone(), String::new())).collect();
        self.begin_session(names, bpm, signature);
        for (index, (_, buffer)) in stems.into_iter().enumerate() {
            self.attach(index, buffer);
        }
    }

    fn begin_session(&mut self, stems: Vec<(String, String)>, bpm: f64, signature: &str) {
        // a running cycle must be gone before its tracks are
        self.stop();
        self.generation += 1;

        self.tracks = stems
            .into_iter()
            .map(|(name, url)| {
                let color = self.config.display.color_for(&name).to_string();
                Track::new(name, url).with_color(color)
            })
            .collect();
        if let Ok(mut g) = self.graph.lock() {
            g.reset_strips(self.tracks.len());
            g.set_master(self.master_volume);
        }

        self.duration = 0.0;
        self.pause_offset = 0.0;
        self.original_bpm = self.sanitize_bpm(bpm);
        self.tempo = TempoMap {
            bpm: self.original_bpm,
            signature: self.parse_signature(signature),
        };
        self.playback_ratio = 1.0;
        self.pitch = PitchShift::default();
        self.apply_gains();

        info!(
            "Session {}: {} stems at {} BPM {}",
            self.generation,
            self.tracks.len(),
            self.original_bpm,
            self.tempo.signature.label()
        );
    }

    fn attach(&mut self, index: usize, buffer: Arc<AudioBuffer>) {
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        info!(
            "Stem '{}' ready: {:.2}s, {} Hz, {} ch",
            track.name,
            buffer.duration(),
            buffer.sample_rate(),
            buffer.channel_count()
        );
        self.duration = self.duration.max(buffer.duration());
        track.attach_buffer(buffer);
    }

    /// Applies finished decodes. Results for an older stem set are dropped.
    /// Returns how many tracks changed.
    pub fn poll_loads(&mut self) -> usize {
        let mut applied = 0;
        while let Some(ev) = self.loader.try_recv() {
            if self.apply_load(ev) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_load(&mut self, ev: LoadEvent) -> bool {
        if ev.generation != self.generation {
            debug!("Discarding stale decode of '{}' (session {})", ev.name, ev.generation);
            return false;
        }
        match ev.result {
            Ok(buffer) => self.attach(ev.index, Arc::new(buffer)),
            Err(e) => {
                error!("Failed to load stem '{}': {e:#}", ev.name);
                if let Some(t) = self.tracks.get_mut(ev.index) {
                    t.mark_failed(format!("{e:#}"));
                }
            }
        }
        true
    }

    pub fn pending_loads(&self) -> usize {
        self.tracks.iter().filter(|t| t.status == LoadStatus::Pending).count()
    }

    /// Waits for the current stem set to finish loading. `false` on timeout.
    pub fn block_until_loaded(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll_loads();
        while self.pending_loads() > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            if let Some(ev) = self.loader.recv_timeout(left) {
                self.apply_load(ev);
            }
        }
        true
    }

    // --- transport ---------------------------------------------------------

    pub fn play_pause(&mut self) {
        if self.state == TransportState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Starts from the paused / stopped position.
    pub fn play(&mut self) {
        if self.state == TransportState::Playing {
            return;
        }
        if self.duration <= 0.0 {
            warn!("Nothing to play yet");
            return;
        }
        self.start_from(self.pause_offset);
    }

    fn start_from(&mut self, offset: f64) {
        let offset = offset.clamp(0.0, self.duration);
        let sources: Vec<_> = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                t.buffer
                    .as_ref()
                    .map(|b| (i, b.clone(), offset.min(b.duration())))
            })
            .collect();

        // one lock, one instant: every voice begins on the same graph frame
        let now = self.clock.now();
        match self.graph.lock() {
            Ok(mut g) => g.start_sources(sources, self.playback_ratio),
            Err(_) => {
                error!("Mix graph unavailable; cannot start playback");
                return;
            }
        }

        self.started_at = now - offset / self.playback_ratio;
        self.pause_offset = offset;
        self.state = TransportState::Playing;
        self.arm_end_timer(now, offset);
        self.frame_loop = true;
        debug!("Playing from {offset:.3}s at ratio {:.3}", self.playback_ratio);
        self.animation_frame();
    }

    fn arm_end_timer(&mut self, now: f64, position: f64) {
        let remaining = ((self.duration - position) / self.playback_ratio).max(0.0);
        self.end_deadline = Some(now + remaining + self.config.transport.end_timer_slack_secs);
    }

    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        self.pause_offset = self.elapsed();
        self.halt();
        self.state = TransportState::Paused;
        debug!("Paused at {:.3}s", self.pause_offset);
    }

    /// Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        self.halt();
        self.state = TransportState::Stopped;
        self.pause_offset = 0.0;
        self.readout = Readout::default();
        self.led.reset();
        self.tap.clear();
        self.analyser.reset();
    }

    fn halt(&mut self) {
        if let Ok(mut g) = self.graph.lock() {
            let n = g.stop_sources();
            if n > 0 {
                debug!("Stopped {n} sources");
            }
        }
        self.end_deadline = None;
        self.frame_loop = false;
    }

    /// Leaves the editor: full stop.
    pub fn close(&mut self) {
        self.stop();
        debug!("Editor closed");
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Jumps to `fraction` of the session. Keeps playing if it was.
    pub fn seek(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let target = fraction * self.duration;
        if self.state == TransportState::Playing {
            self.pause();
            self.pause_offset = target;
            self.start_from(target);
        } else {
            self.pause_offset = target;
            self.readout.playhead = if self.duration > 0.0 { fraction } else { 0.0 };
            self.readout.time = format_clock(target);
        }
    }

    /// Buffer-time position right now.
    pub fn elapsed(&self) -> f64 {
        match self.state {
            TransportState::Playing => {
                ((self.clock.now() - self.started_at) * self.playback_ratio).clamp(0.0, self.duration)
            }
            _ => self.pause_offset,
        }
    }

    // --- tempo -------------------------------------------------------------

    fn sanitize_bpm(&self, bpm: f64) -> f64 {
        let t = &self.config.tempo;
        if !bpm.is_finite() || bpm <= 0.0 {
            return t.fallback_bpm();
        }
        let (lo, hi) = t.bpm_range();
        bpm.clamp(lo, hi)
    }

    fn parse_signature(&self, text: &str) -> TimeSignature {
        TimeSignature::parse(text)
            .or_else(|| TimeSignature::parse(&self.config.tempo.default_time_signature))
            .unwrap_or_default()
    }

    /// Retimes every track to `bpm` relative to the loaded tempo. While
    /// playing the position carries on without a jump and the end timer is
    /// re-armed for the new rate.
    pub fn set_tempo(&mut self, bpm: f64) {
        let bpm = self.sanitize_bpm(bpm);
        let new_ratio = bpm / self.original_bpm;

        if self.state == TransportState::Playing {
            let now = self.clock.now();
            // clock basis and voice rates change under the same lock
            let graph = self.graph.clone();
            if let Ok(mut g) = graph.lock() {
                let position = ((now - self.started_at) * self.playback_ratio).clamp(0.0, self.duration);
                self.started_at = rebase_clock(now, self.started_at, self.playback_ratio, new_ratio);
                g.set_rate(new_ratio);
                self.playback_ratio = new_ratio;
                self.arm_end_timer(now, position);
            }
        }

        self.playback_ratio = new_ratio;
        self.tempo.bpm = bpm;
        self.pitch = PitchShift::from_ratio(new_ratio);
        debug!("Tempo {bpm} BPM, ratio {new_ratio:.4}");
    }

    /// Text from a BPM field; anything unparsable means the default tempo.
    pub fn set_tempo_text(&mut self, text: &str) {
        let bpm = text.trim().parse::<f64>().unwrap_or(self.config.tempo.fallback_bpm());
        self.set_tempo(bpm);
    }

    pub fn reset_tempo(&mut self) {
        self.set_tempo(self.original_bpm);
    }

    pub fn at_original_tempo(&self) -> bool {
        self.tempo.bpm == self.original_bpm
    }

    /// `"N/D"`; malformed input falls back to the configured default.
    pub fn set_time_signature(&mut self, text: &str) {
        self.tempo.signature = self.parse_signature(text);
    }

    // --- mixer -------------------------------------------------------------

    fn track_mut(&mut self, index: usize) -> Result<&mut Track> {
        let len = self.tracks.len();
        self.tracks
            .get_mut(index)
            .ok_or(TransportError::TrackIndexOutOfRange { index, len })
    }

    pub fn toggle_mute(&mut self, index: usize) -> Result<bool> {
        let t = self.track_mut(index)?;
        t.muted = !t.muted;
        let muted = t.muted;
        self.apply_gains();
        Ok(muted)
    }

    pub fn toggle_solo(&mut self, index: usize) -> Result<bool> {
        let t = self.track_mut(index)?;
        t.soloed = !t.soloed;
        let soloed = t.soloed;
        self.apply_gains();
        Ok(soloed)
    }

    /// `percent` as on the slider, 0..=150.
    pub fn set_volume(&mut self, index: usize, percent: f32) -> Result<()> {
        self.track_mut(index)?.set_volume_percent(percent);
        self.apply_gains();
        Ok(())
    }

    /// `percent` from -100 (left) to 100 (right).
    pub fn set_pan(&mut self, index: usize, percent: f32) -> Result<()> {
        let t = self.track_mut(index)?;
        t.set_pan_percent(percent);
        let pan = t.pan;
        if let Ok(mut g) = self.graph.lock() {
            g.set_pan(index, pan);
        }
        Ok(())
    }

    pub fn set_master_volume(&mut self, percent: f32) {
        self.master_volume = percent.max(0.0) / 100.0;
        if let Ok(mut g) = self.graph.lock() {
            g.set_master(self.master_volume);
        }
    }

    /// Pushes mute/solo/volume resolution and pan to the graph.
    fn apply_gains(&mut self) {
        let volumes = gain::effective_volumes(&self.tracks);
        if let Ok(mut g) = self.graph.lock() {
            for (i, (v, t)) in volumes.into_iter().zip(&self.tracks).enumerate() {
                g.set_gain(i, v);
                g.set_pan(i, t.pan);
            }
        }
    }

    /// Effective gain of every track as the policy resolves it right now.
    pub fn effective_volumes(&self) -> Vec<f32> {
        gain::effective_volumes(&self.tracks)
    }

    // --- export ------------------------------------------------------------

    /// Starts an offline render of the current mix. Rejected when no stem
    /// has decoded.
    pub fn export_mix(&self) -> Result<MixdownJob> {
        let plan = MixdownPlan::snapshot(&self.tracks, self.duration, self.master_volume)?;
        let filename = export_filename(chrono::Utc::now().timestamp_millis());
        info!("Exporting {filename}");
        Ok(MixdownJob::spawn(plan, filename))
    }

    // --- frame loop --------------------------------------------------------

    /// Everything a display frame needs: loads, the end timer, then the
    /// readouts when the frame loop is running.
    pub fn poll(&mut self) {
        self.poll_loads();
        self.poll_end_timer();
        if self.frame_loop {
            self.animation_frame();
        }
    }

    /// Returns true if the timer fired.
    pub fn poll_end_timer(&mut self) -> bool {
        let Some(deadline) = self.end_deadline else {
            return false;
        };
        if self.clock.now() < deadline {
            return false;
        }
        self.end_deadline = None;
        if self.looping {
            debug!("End reached, looping");
            self.stop();
            self.start_from(0.0);
        } else {
            debug!("End reached");
            self.stop();
        }
        true
    }

    /// Refreshes playhead, time, bar.beat, LED and meter. Does nothing
    /// unless playing.
    pub fn animation_frame(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        let now = self.clock.now();
        let elapsed = self.elapsed();

        self.readout.playhead = if self.duration > 0.0 {
            (elapsed / self.duration).min(1.0)
        } else {
            0.0
        };
        self.readout.time = format_clock(elapsed);

        self.tap.drain();
        let bytes = self.analyser.byte_frequency_data(&self.tap.window());
        self.readout.meter = self.analyser.level(&bytes);

        let position = self.tempo.position_at(elapsed);
        self.readout.bar_beat = position.label();
        self.led.update(&position, now);
        self.readout.led = self.led.state(now);
    }

    // --- drawing -----------------------------------------------------------

    pub fn ruler_layout(&self, width: f64) -> Option<RulerLayout> {
        RulerLayout::compute(&self.tempo, self.duration, width)
    }

    pub fn draw_ruler(&self, surface: &mut dyn Surface, size: SurfaceSize) -> Option<RulerLayout> {
        waveform::draw_ruler(surface, &self.tempo, self.duration, size)
    }

    /// Draws one lane; placeholder peaks until its audio is decoded.
    pub fn draw_track(&self, index: usize, surface: &mut dyn Surface, size: SurfaceSize) -> bool {
        let Some(track) = self.tracks.get(index) else {
            return false;
        };
        let color = Color::from_hex(&track.color)
            .or_else(|_| Color::from_hex(&self.config.display.fallback_color))
            .unwrap_or(Color::rgb(0x88, 0x88, 0x88));
        waveform::draw_waveform(
            surface,
            track.buffer.as_deref(),
            color,
            size,
            self.config.display.placeholder_bins,
        )
    }

    /// Ruler surface matching a lane width, at the configured height.
    pub fn ruler_size(&self, width: f64, device_pixel_ratio: f64) -> SurfaceSize {
        SurfaceSize::new(width, self.config.display.ruler_height, device_pixel_ratio)
    }

    /// Resize path: the ruler plus every decoded lane. Lanes beyond the
    /// track count are left alone.
    pub fn redraw<S: Surface>(&self, ruler: &mut S, lanes: &mut [S], lane_size: SurfaceSize) {
        self.draw_ruler(ruler, self.ruler_size(lane_size.width, lane_size.device_pixel_ratio));
        for (i, lane) in lanes.iter_mut().enumerate() {
            if self.tracks.get(i).is_some_and(Track::is_ready) {
                self.draw_track(i, lane, lane_size);
            }
        }
    }

    // --- accessors ---------------------------------------------------------

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn frame_loop_running(&self) -> bool {
        self.frame_loop
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn playback_ratio(&self) -> f64 {
        self.playback_ratio
    }

    pub fn original_bpm(&self) -> f64 {
        self.original_bpm
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn pause_offset(&self) -> f64 {
        self.pause_offset
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    pub fn pitch_shift(&self) -> &PitchShift {
        &self.pitch
    }

    /// Wall seconds until the end timer fires, if armed (slack included).
    pub fn end_timer_in(&self) -> Option<f64> {
        self.end_deadline.map(|d| d - self.clock.now())
    }

    pub fn active_sources(&self) -> usize {
        self.graph.lock().map(|g| g.active_sources()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::engine::readout::LedState;
    use crate::loader::FileFetcher;
    use crate::waveform::surface::{DisplayList, DrawOp};
    use approx::assert_abs_diff_eq;

    fn transport() -> (Transport, ManualClock) {
        transport_with(EditorConfig::default())
    }

    fn transport_with(config: EditorConfig) -> (Transport, ManualClock) {
        let clock = ManualClock::new();
        let t = Transport::new(config, Arc::new(clock.clone()), 1_000, Arc::new(FileFetcher));
        (t, clock)
    }

    fn silent(secs: f64) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new(1_000, vec![vec![0.0; (secs * 1_000.0) as usize]]))
    }

    #[test]
    fn test_rebase_clock_keeps_position() {
        for (old, new) in [(1.0, 2.0), (2.0, 0.5), (0.1667, 15.0), (1.0, 1.0)] {
            let (now, started) = (37.25, 31.0);
            let before = (now - started) * old;
            let after = (now - rebase_clock(now, started, old, new)) * new;
            assert_abs_diff_eq!(before, after, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_play_requires_audio() {
        let (mut t, _clock) = transport();
        t.play();
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.active_sources(), 0);
    }

    #[test]
    fn test_pause_resume_offsets() {
        let (mut t, clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(4.0))], 120.0, "4/4");
        clock.set(100.0);
        t.play();
        clock.advance(1.25);
        t.pause();
        assert_eq!(t.state(), TransportState::Paused);
        assert_abs_diff_eq!(t.pause_offset(), 1.25, epsilon = 1e-9);
        assert_eq!(t.active_sources(), 0);
        assert!(!t.frame_loop_running());
        assert_eq!(t.end_timer_in(), None);

        clock.advance(10.0);
        t.play();
        assert_abs_diff_eq!(t.elapsed(), 1.25, epsilon = 1e-9);
        clock.advance(0.5);
        assert_abs_diff_eq!(t.elapsed(), 1.75, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_while_stopped_only_moves_readouts() {
        let (mut t, _clock) = transport();
        t.load_buffers(vec![("bass".into(), silent(10.0))], 120.0, "4/4");
        t.seek(0.25);
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.active_sources(), 0);
        assert_abs_diff_eq!(t.pause_offset(), 2.5, epsilon = 1e-9);
        assert_eq!(t.readout().playhead, 0.25);
        assert_eq!(t.readout().time, "0:02.5");

        t.seek(7.0);
        assert_abs_diff_eq!(t.pause_offset(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_while_playing_restarts_at_target() {
        let (mut t, clock) = transport();
        t.load_buffers(vec![("bass".into(), silent(10.0))], 120.0, "4/4");
        t.play();
        clock.advance(1.0);
        t.seek(0.5);
        assert!(t.is_playing());
        assert_eq!(t.active_sources(), 1);
        assert_abs_diff_eq!(t.elapsed(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.end_timer_in().unwrap(), 5.05, epsilon = 1e-9);
    }

    #[test]
    fn test_bpm_input_is_bounded() {
        let (mut t, _clock) = transport();
        t.set_tempo(1_000.0);
        assert_eq!(t.tempo().bpm, 300.0);
        t.set_tempo(0.0);
        assert_eq!(t.tempo().bpm, 120.0);
        t.set_tempo(f64::NAN);
        assert_eq!(t.tempo().bpm, 120.0);
        t.set_tempo_text("abc");
        assert_eq!(t.tempo().bpm, 120.0);
        t.set_tempo_text(" 90 ");
        assert_eq!(t.tempo().bpm, 90.0);
        assert!(t.playback_ratio() > 0.0);
        assert_eq!(t.pitch_shift().label, "-5.0 st");
        t.reset_tempo();
        assert!(t.at_original_tempo());
        assert_eq!(t.pitch_shift().label, "");
    }

    #[test]
    fn test_inverted_tempo_bounds_do_not_panic() {
        let mut config = EditorConfig::default();
        config.tempo.min_bpm = 200.0;
        config.tempo.max_bpm = 100.0;
        let (mut t, _clock) = transport_with(config);
        t.set_tempo(150.0);
        assert_eq!(t.tempo().bpm, 150.0);
        t.set_tempo(20.0);
        assert_eq!(t.tempo().bpm, 100.0);
        t.set_tempo(500.0);
        assert_eq!(t.tempo().bpm, 200.0);

        let mut config = EditorConfig::default();
        config.tempo.min_bpm = f64::NAN;
        config.tempo.default_bpm = f64::NAN;
        let (mut t, _clock) = transport_with(config);
        assert_eq!(t.tempo().bpm, 120.0);
        t.set_tempo(5.0);
        assert_eq!(t.tempo().bpm, 20.0);
        t.set_tempo(f64::NAN);
        assert_eq!(t.tempo().bpm, 120.0);
    }

    #[test]
    fn test_signature_fallback() {
        let (mut t, _clock) = transport();
        t.set_time_signature("6/8");
        assert_eq!(t.tempo().signature.label(), "6/8");
        t.set_time_signature("");
        assert_eq!(t.tempo().signature.label(), "4/4");
    }

    #[test]
    fn test_frame_readouts_and_led() {
        let (mut t, clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(8.0))], 120.0, "4/4");
        t.play();
        assert_eq!(t.readout().led, LedState::Accent);

        clock.advance(2.5);
        t.poll();
        let r = t.readout();
        assert_eq!(r.bar_beat, "2.2");
        assert_eq!(r.time, "0:02.5");
        assert_abs_diff_eq!(r.playhead, 2.5 / 8.0, epsilon = 1e-9);
        assert_eq!(r.led, LedState::Beat);
        assert_eq!(r.meter, 0.0);

        clock.advance(0.1);
        t.poll();
        assert_eq!(t.readout().led, LedState::Off);
    }

    #[test]
    fn test_end_timer_loops() {
        let (mut t, clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(2.0))], 120.0, "4/4");
        assert!(t.toggle_loop());
        t.set_tempo(240.0);
        t.play();
        clock.advance(1.0);
        assert!(!t.poll_end_timer());
        clock.advance(0.05);
        assert!(t.poll_end_timer());
        assert!(t.is_playing());
        assert_eq!(t.playback_ratio(), 2.0);
        assert_abs_diff_eq!(t.elapsed(), 0.0, epsilon = 1e-9);
        assert_eq!(t.active_sources(), 1);
    }

    #[test]
    fn test_end_timer_stops_without_loop() {
        let (mut t, clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(2.0))], 120.0, "4/4");
        assert!(!t.is_looping());
        t.play();
        clock.advance(1.5);
        t.poll();
        assert_eq!(t.readout().time, "0:01.5");

        clock.advance(0.6);
        assert!(t.poll_end_timer());
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.pause_offset(), 0.0);
        assert_eq!(t.active_sources(), 0);
        assert_eq!(t.readout().time, "0:00.0");
        assert_eq!(t.readout().bar_beat, "1.1");
        assert_eq!(t.readout().playhead, 0.0);
        assert!(!t.frame_loop_running());
        assert_eq!(t.end_timer_in(), None);
        assert!(!t.poll_end_timer());
    }

    #[test]
    fn test_redraw_uses_configured_ruler_height() {
        let mut config = EditorConfig::default();
        config.display.ruler_height = 32.0;
        let (mut t, _clock) = transport_with(config);
        t.load_buffers(vec![("drums".into(), silent(4.0)), ("bass".into(), silent(4.0))], 120.0, "4/4");

        let mut ruler = DisplayList::new();
        let mut lanes = vec![DisplayList::new(), DisplayList::new(), DisplayList::new()];
        t.redraw(&mut ruler, &mut lanes, SurfaceSize::new(400.0, 72.0, 2.0));

        assert_eq!(
            ruler.ops.first(),
            Some(&DrawOp::Configure { backing_width: 800, backing_height: 64, scale: 2.0 })
        );
        assert!(!lanes[0].is_empty() && !lanes[1].is_empty());
        assert!(lanes[2].is_empty());
        assert_eq!(t.ruler_size(400.0, 1.0).height, 32.0);
    }

    #[test]
    fn test_track_index_errors() {
        let (mut t, _clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(1.0))], 120.0, "4/4");
        assert!(matches!(
            t.toggle_mute(3),
            Err(TransportError::TrackIndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(t.set_volume(0, 80.0).is_ok());
        assert_eq!(t.tracks()[0].volume_label(), "80%");
        t.set_pan(0, 40.0).unwrap();
        assert_eq!(t.tracks()[0].pan_label(), "R40");
        t.set_master_volume(50.0);
        assert_eq!(t.master_volume(), 0.5);
    }

    #[test]
    fn test_track_colors_from_config() {
        let (mut t, _clock) = transport();
        t.load_buffers(vec![("drums".into(), silent(1.0)), ("theremin".into(), silent(1.0))], 120.0, "4/4");
        assert_eq!(t.tracks()[0].color, "#f87171");
        assert_eq!(t.tracks()[1].color, "#888888");
    }
}
