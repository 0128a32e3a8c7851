// tests/transport_scenarios.rs

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use approx::assert_abs_diff_eq;

use stem_transport::config::EditorConfig;
use stem_transport::engine::{AudioBuffer, AudioClock, LoadStatus, ManualClock, Transport, TransportState};
use stem_transport::loader::StemFetcher;
use stem_transport::session::encode_wav;
use stem_transport::TransportError;

const SR: u32 = 8_000;

/// Serves WAV bytes from memory. Urls containing `slow` wait for a release.
struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    gate: Mutex<Receiver<()>>,
}

impl MemoryFetcher {
    fn new(files: HashMap<String, Vec<u8>>) -> (Self, Sender<()>) {
        let (tx, rx) = channel();
        (Self { files, gate: Mutex::new(rx) }, tx)
    }
}

impl StemFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        if url.contains("slow") {
            if let Ok(rx) = self.gate.lock() {
                let _ = rx.recv_timeout(Duration::from_secs(10));
            }
        }
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 {url}"))
    }
}

fn silent(secs: f64) -> Arc<AudioBuffer> {
    Arc::new(AudioBuffer::new(SR, vec![vec![0.0; (secs * SR as f64) as usize]; 2]))
}

fn tone(secs: f64, level: f32) -> Arc<AudioBuffer> {
    Arc::new(AudioBuffer::new(SR, vec![vec![level; (secs * SR as f64) as usize]; 2]))
}

fn transport_with(fetcher: Arc<dyn StemFetcher>) -> (Transport, ManualClock) {
    let clock = ManualClock::new();
    let mut config = EditorConfig::default();
    config.api_base = "mem://api".to_string();
    let t = Transport::new(config, Arc::new(clock.clone()), SR, fetcher);
    (t, clock)
}

fn transport() -> (Transport, ManualClock) {
    let (fetcher, _gate) = MemoryFetcher::new(HashMap::new());
    transport_with(Arc::new(fetcher))
}

fn wav_secs(secs: f64) -> Vec<u8> {
    let n = (secs * SR as f64) as usize;
    encode_wav(&[vec![0.1; n], vec![0.1; n]], SR).unwrap()
}

#[test]
fn test_play_then_two_seconds_in() {
    let (mut t, clock) = transport();
    t.load_buffers(vec![("drums".into(), silent(4.0)), ("bass".into(), silent(4.0))], 120.0, "4/4");
    clock.set(10.0);
    t.play();
    assert_eq!(t.active_sources(), 2);

    clock.advance(2.0);
    t.poll();
    assert_abs_diff_eq!(t.elapsed(), 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(t.readout().playhead, 0.5, epsilon = 1e-9);
    assert_eq!(t.readout().time, "0:02.0");
    assert_eq!(t.readout().bar_beat, "2.1");
}

#[test]
fn test_tempo_change_mid_play_is_continuous() {
    let (mut t, clock) = transport();
    t.load_buffers(vec![("drums".into(), silent(8.0))], 120.0, "4/4");
    t.play();
    clock.advance(2.0);

    t.set_tempo(240.0);
    assert_abs_diff_eq!(t.elapsed(), 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(t.end_timer_in().unwrap(), 3.05, epsilon = 1e-9);
    assert_eq!(t.pitch_shift().label, "+12.0 st");
    {
        let graph = t.graph();
        let g = graph.lock().unwrap();
        assert_eq!(g.voice(0).map(|v| v.rate()), Some(2.0));
    }

    clock.advance(1.0);
    assert_abs_diff_eq!(t.elapsed(), 4.0, epsilon = 1e-9);

    t.set_tempo(60.0);
    assert_abs_diff_eq!(t.elapsed(), 4.0, epsilon = 1e-9);
    assert_abs_diff_eq!(t.end_timer_in().unwrap(), 8.05, epsilon = 1e-9);
}

#[test]
fn test_solo_and_unsolo() {
    let (mut t, _clock) = transport();
    t.load_buffers(
        vec![("drums".into(), silent(1.0)), ("bass".into(), silent(1.0)), ("vocals".into(), silent(1.0))],
        120.0,
        "4/4",
    );
    assert!(t.toggle_solo(1).unwrap());
    assert_eq!(t.effective_volumes(), vec![0.0, 1.0, 0.0]);
    {
        let graph = t.graph();
        let g = graph.lock().unwrap();
        assert_eq!(g.gain_target(0), Some(0.0));
        assert_eq!(g.gain_target(1), Some(1.0));
    }

    t.toggle_mute(1).unwrap();
    assert_eq!(t.effective_volumes(), vec![0.0, 0.0, 0.0]);

    assert!(!t.toggle_solo(1).unwrap());
    assert_eq!(t.effective_volumes(), vec![1.0, 0.0, 1.0]);
}

#[test]
fn test_mute_silences_rendered_output() {
    let (mut t, _clock) = transport();
    t.load_buffers(vec![("drums".into(), tone(2.0, 0.5))], 120.0, "4/4");
    t.play();
    let graph = t.graph();
    let mut out = vec![0.0f32; 2 * 800];

    graph.lock().unwrap().render(&mut out);
    assert!(out.iter().any(|s| s.abs() > 0.1));

    t.toggle_mute(0).unwrap();
    // let the ramp settle
    for _ in 0..4 {
        graph.lock().unwrap().render(&mut out);
    }
    assert!(out.iter().all(|s| s.abs() < 1e-3));
}

#[test]
fn test_stop_is_idempotent() {
    let (mut t, clock) = transport();
    t.stop();
    t.stop();
    assert_eq!(t.state(), TransportState::Stopped);

    t.load_buffers(vec![("drums".into(), silent(4.0))], 120.0, "4/4");
    t.play();
    clock.advance(1.0);
    t.poll();
    t.stop();
    t.stop();
    assert_eq!(t.state(), TransportState::Stopped);
    assert_eq!(t.pause_offset(), 0.0);
    assert_eq!(t.active_sources(), 0);
    assert_eq!(t.readout().time, "0:00.0");
    assert_eq!(t.readout().bar_beat, "1.1");
    assert!(!t.frame_loop_running());
}

#[test]
fn test_silent_export_is_exact_wav() {
    let (mut t, _clock) = transport();
    t.load_buffers(vec![("drums".into(), silent(1.5)), ("bass".into(), silent(1.5))], 120.0, "4/4");
    let mix = t.export_mix().unwrap().wait().unwrap();

    let frames = (1.5 * SR as f64) as usize;
    assert_eq!(mix.bytes.len(), 44 + frames * 4);
    assert!(mix.filename.starts_with("stem_mix_") && mix.filename.ends_with(".wav"));

    let mut reader = hound::WavReader::new(Cursor::new(mix.bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, SR);
    assert_eq!(spec.bits_per_sample, 16);
    assert!(reader.samples::<i16>().all(|s| s.unwrap() == 0));
}

#[test]
fn test_unequal_durations_use_longest() {
    let (mut t, clock) = transport();
    t.load_buffers(vec![("drums".into(), tone(2.0, 0.25)), ("pad".into(), tone(5.0, 0.25))], 120.0, "4/4");
    assert_eq!(t.duration(), 5.0);

    t.play();
    assert_abs_diff_eq!(t.end_timer_in().unwrap(), 5.05, epsilon = 1e-9);
    clock.advance(3.0);
    assert!(!t.poll_end_timer());
    assert!(t.is_playing());

    let mix = t.export_mix().unwrap().wait().unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(mix.bytes)).unwrap();
    assert_eq!(reader.duration() as usize, 5 * SR as usize);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    // both stems up to 2 s, the pad alone after
    let early = samples[2 * SR as usize];
    let late = samples[2 * 4 * SR as usize];
    assert!(early > late && late > 0);
}

#[test]
fn test_stale_decodes_are_discarded() {
    let mut files = HashMap::new();
    files.insert("mem://api/slow/drums.wav".to_string(), wav_secs(3.0));
    files.insert("mem://api/fast/bass.wav".to_string(), wav_secs(1.0));
    let (fetcher, gate) = MemoryFetcher::new(files);
    let (mut t, _clock) = transport_with(Arc::new(fetcher));

    t.load_stems(vec![("drums", "/slow/drums.wav")], 120.0, "4/4");
    assert_eq!(t.generation(), 1);
    t.load_stems(vec![("bass", "/fast/bass.wav")], 100.0, "3/4");
    assert_eq!(t.generation(), 2);

    assert!(t.block_until_loaded(Duration::from_secs(10)));
    assert_abs_diff_eq!(t.duration(), 1.0, epsilon = 1e-6);

    gate.send(()).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(t.poll_loads(), 0);

    assert_eq!(t.tracks().len(), 1);
    assert_eq!(t.tracks()[0].name, "bass");
    assert_abs_diff_eq!(t.duration(), 1.0, epsilon = 1e-6);
    assert_eq!(t.original_bpm(), 100.0);
}

#[test]
fn test_failed_decode_leaves_others_playable() {
    let mut files = HashMap::new();
    files.insert("mem://api/s/drums.wav".to_string(), wav_secs(2.0));
    files.insert("mem://api/s/bass.wav".to_string(), b"definitely not audio".to_vec());
    let (fetcher, _gate) = MemoryFetcher::new(files);
    let (mut t, _clock) = transport_with(Arc::new(fetcher));

    t.load_stems(
        vec![("drums", "/s/drums.wav"), ("bass", "/s/bass.wav"), ("vocals", "/s/missing.wav")],
        120.0,
        "4/4",
    );
    assert!(t.block_until_loaded(Duration::from_secs(10)));

    assert_eq!(t.tracks()[0].status, LoadStatus::Ready);
    assert!(matches!(t.tracks()[1].status, LoadStatus::Failed(_)));
    assert!(matches!(t.tracks()[2].status, LoadStatus::Failed(_)));

    t.play();
    assert!(t.is_playing());
    assert_eq!(t.active_sources(), 1);
}

#[test]
fn test_export_without_stems_is_rejected() {
    let (fetcher, _gate) = MemoryFetcher::new(HashMap::new());
    let (mut t, _clock) = transport_with(Arc::new(fetcher));
    assert!(matches!(t.export_mix(), Err(TransportError::NoStemsLoaded)));

    t.load_stems(vec![("drums", "/nowhere.wav")], 120.0, "4/4");
    assert!(t.block_until_loaded(Duration::from_secs(10)));
    assert!(matches!(t.export_mix(), Err(TransportError::NoStemsLoaded)));
}

#[test]
fn test_clock_trait_object() {
    let clock = ManualClock::new();
    let shared: Arc<dyn AudioClock> = Arc::new(clock.clone());
    clock.set(1.5);
    assert_eq!(shared.now(), 1.5);
}
