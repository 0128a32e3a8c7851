// src/editor.rs

use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use crossterm::cursor::MoveTo;
use crossterm::event::KeyCode;
use crossterm::terminal::{Clear, ClearType};
use log::{error, info};

use crate::engine::{LedState, LoadStatus, Transport, TransportState};
use crate::session::MixdownJob;
use crate::waveform::terminal::{render_lane, render_ruler};
use crate::waveform::Peaks;

const SEEK_STEP: f64 = 0.05;
const BPM_STEP: f64 = 1.0;
const VOLUME_STEP: f32 = 10.0;
const PAN_STEP: f32 = 10.0;
const METER_CELLS: usize = 20;

/// Keyboard front end for a [`Transport`]: maps keys to transport calls and
/// composes one text frame per tick.
pub struct StemEditor {
    selected: usize,
    export_dir: PathBuf,
    export: Option<MixdownJob>,
    status: String,
    lane_width: usize,
    lane_height: usize,
    placeholders: Vec<Peaks>,
    placeholder_generation: u64,
    draw_buffer: String,
}

impl StemEditor {
    pub fn new(export_dir: PathBuf, lane_width: usize, lane_height: usize) -> Self {
        Self {
            selected: 0,
            export_dir,
            export: None,
            status: String::new(),
            lane_width: lane_width.max(8),
            lane_height: lane_height.max(4),
            placeholders: Vec::new(),
            placeholder_generation: 0,
            draw_buffer: String::with_capacity(8 * 1024),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn export_running(&self) -> bool {
        self.export.is_some()
    }

    pub fn should_quit(&self, key: KeyCode) -> bool {
        matches!(key, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
    }

    pub fn handle_key(&mut self, t: &mut Transport, key: KeyCode) {
        match key {
            KeyCode::Char(' ') => t.play_pause(),
            KeyCode::Char('s') | KeyCode::Char('S') => t.stop(),
            KeyCode::Char('l') | KeyCode::Char('L') => {
                let on = t.toggle_loop();
                self.status = format!("Loop {}", if on { "on" } else { "off" });
            }
            KeyCode::Left => self.seek_by(t, -SEEK_STEP),
            KeyCode::Right => self.seek_by(t, SEEK_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                let bpm = t.tempo().bpm + BPM_STEP;
                t.set_tempo(bpm);
            }
            KeyCode::Char('-') | KeyCode::Down => {
                let bpm = t.tempo().bpm - BPM_STEP;
                t.set_tempo(bpm);
            }
            KeyCode::Char('r') | KeyCode::Char('R') => t.reset_tempo(),
            KeyCode::Char(c @ '1'..='9') => {
                let idx = c as usize - '1' as usize;
                if idx < t.tracks().len() {
                    self.selected = idx;
                }
            }
            KeyCode::Char('m') | KeyCode::Char('M') => self.on_selected(t, |t, i| t.toggle_mute(i).map(|_| ())),
            KeyCode::Char('o') | KeyCode::Char('O') => self.on_selected(t, |t, i| t.toggle_solo(i).map(|_| ())),
            KeyCode::Char('[') => self.nudge_pan(t, -PAN_STEP),
            KeyCode::Char(']') => self.nudge_pan(t, PAN_STEP),
            KeyCode::Char(',') => self.nudge_volume(t, -VOLUME_STEP),
            KeyCode::Char('.') => self.nudge_volume(t, VOLUME_STEP),
            KeyCode::Char('x') | KeyCode::Char('X') => self.start_export(t),
            _ => {}
        }
    }

    fn seek_by(&mut self, t: &mut Transport, delta: f64) {
        if t.duration() <= 0.0 {
            return;
        }
        let fraction = t.elapsed() / t.duration() + delta;
        t.seek(fraction.clamp(0.0, 1.0));
    }

    fn on_selected<F>(&mut self, t: &mut Transport, f: F)
    where
        F: FnOnce(&mut Transport, usize) -> crate::error::Result<()>,
    {
        if let Err(e) = f(t, self.selected) {
            self.status = e.to_string();
        }
    }

    fn nudge_volume(&mut self, t: &mut Transport, delta: f32) {
        let Some(track) = t.tracks().get(self.selected) else {
            return;
        };
        let percent = (track.volume * 100.0).round() + delta;
        self.on_selected(t, |t, i| t.set_volume(i, percent));
    }

    fn nudge_pan(&mut self, t: &mut Transport, delta: f32) {
        let Some(track) = t.tracks().get(self.selected) else {
            return;
        };
        let percent = (track.pan * 100.0).round() + delta;
        self.on_selected(t, |t, i| t.set_pan(i, percent));
    }

    fn start_export(&mut self, t: &mut Transport) {
        if self.export.is_some() {
            self.status = "Export already running".to_string();
            return;
        }
        match t.export_mix() {
            Ok(job) => {
                self.export = Some(job);
                self.status = "Exporting...".to_string();
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    /// Per-frame work: transport polling and collecting a finished export.
    pub fn tick(&mut self, t: &mut Transport) {
        t.poll();

        let Some(job) = self.export.as_mut() else {
            return;
        };
        let Some(result) = job.try_take() else {
            return;
        };
        self.export = None;
        self.status = match result {
            Ok(mix) => match mix.write_to(&self.export_dir) {
                Ok(path) => {
                    info!("Mix written to {}", path.display());
                    format!("Saved {}", path.display())
                }
                Err(e) => {
                    error!("Could not write mix: {e:#}");
                    format!("Export failed: {e}")
                }
            },
            Err(e) => e.to_string(),
        };
    }

    fn refresh_placeholders(&mut self, t: &Transport) {
        if self.placeholder_generation == t.generation() && self.placeholders.len() == t.tracks().len() {
            return;
        }
        let mut rng = rand::rng();
        let bins = t.config().display.placeholder_bins;
        self.placeholders = t
            .tracks()
            .iter()
            .map(|_| Peaks::placeholder(bins, self.lane_width, &mut rng))
            .collect();
        self.placeholder_generation = t.generation();
    }

    /// Builds the whole screen into an internal buffer and returns it.
    pub fn compose(&mut self, t: &Transport) -> &str {
        self.refresh_placeholders(t);
        let r = t.readout();
        let width = self.lane_width;
        let playhead = (t.state() != TransportState::Stopped || r.playhead > 0.0).then_some(r.playhead);

        self.draw_buffer.clear();
        let buf = &mut self.draw_buffer;
        let _ = write!(buf, "{}", MoveTo(0, 0));

        let led = match r.led {
            LedState::Off => '·',
            LedState::Beat => 'o',
            LedState::Accent => '●',
        };
        let filled = ((r.meter / 100.0) * METER_CELLS as f32).round() as usize;
        let meter: String = (0..METER_CELLS).map(|i| if i < filled.min(METER_CELLS) { '#' } else { '-' }).collect();
        let state = match t.state() {
            TransportState::Playing => "PLAY",
            TransportState::Paused => "PAUSE",
            TransportState::Stopped => "STOP",
        };
        let _ = write!(
            buf,
            "{state:<5} {} / {}  bar {:<6} {led}  [{meter}]  {:.0} BPM {} {}{}\x1b[K\r\n",
            r.time,
            crate::engine::format_clock(t.duration()),
            r.bar_beat,
            t.tempo().bpm,
            t.tempo().signature.label(),
            t.pitch_shift().label,
            if t.is_looping() { "  LOOP" } else { "" },
        );

        let ruler = t
            .ruler_layout(width as f64)
            .map(|layout| render_ruler(&layout, width))
            .unwrap_or_default();
        let _ = write!(buf, "    {ruler}\x1b[K\r\n");

        for (i, track) in t.tracks().iter().enumerate() {
            let marker = if i == self.selected { '>' } else { ' ' };
            let status = match &track.status {
                LoadStatus::Pending => " loading".to_string(),
                LoadStatus::Ready => String::new(),
                LoadStatus::Failed(reason) => format!(" failed: {reason}"),
            };
            let _ = write!(
                buf,
                "{marker}{} {:<10} {}{} vol {:>4} pan {:>4}{status}\x1b[K\r\n",
                i + 1,
                track.name,
                if track.muted { 'M' } else { '-' },
                if track.soloed { 'S' } else { '-' },
                track.volume_label(),
                track.pan_label(),
            );

            let peaks = match &track.buffer {
                Some(b) => b.peaks(width),
                None => std::sync::Arc::new(self.placeholders.get(i).cloned().unwrap_or_else(|| Peaks::from_samples(&[], width))),
            };
            for line in render_lane(&peaks, self.lane_height, playhead) {
                let _ = write!(buf, "    {line}\x1b[K\r\n");
            }
        }

        let _ = write!(buf, "{}", Clear(ClearType::UntilNewLine));
        let _ = write!(
            buf,
            "master {:.0}%  {}\x1b[K\r\n",
            t.master_volume() * 100.0,
            self.status
        );
        let _ = write!(
            buf,
            "[SPACE] play/pause [S] stop [L] loop [</>] seek [+/-] tempo [R] reset [1-9] track [M] mute [O] solo [ [ ] ] pan [,/.] vol [X] export [Q] quit\x1b[K"
        );
        &self.draw_buffer
    }
}
