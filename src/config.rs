// src/config.rs

//! Editor configuration
//!
//! Stored as JSON. Every section is `#[serde(default)]`, so a partial file
//! only overrides the keys it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Base used to resolve stem URLs that are not absolute.
    pub api_base: String,
    pub tempo: TempoConfig,
    pub transport: TransportConfig,
    pub meter: MeterConfig,
    pub display: DisplayConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            tempo: TempoConfig::default(),
            transport: TransportConfig::default(),
            meter: MeterConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub default_bpm: f64,
    pub default_time_signature: String,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            default_bpm: 120.0,
            default_time_signature: "4/4".to_string(),
            min_bpm: 20.0,
            max_bpm: 300.0,
        }
    }
}

impl TempoConfig {
    /// `(min, max)` in ascending order. A bound that is not a positive
    /// finite number falls back to its default.
    pub fn bpm_range(&self) -> (f64, f64) {
        let defaults = Self::default();
        let usable = |v: f64| v.is_finite() && v > 0.0;
        let lo = if usable(self.min_bpm) { self.min_bpm } else { defaults.min_bpm };
        let hi = if usable(self.max_bpm) { self.max_bpm } else { defaults.max_bpm };
        if lo <= hi { (lo, hi) } else { (hi, lo) }
    }

    /// Tempo used when none (or nonsense) is given.
    pub fn fallback_bpm(&self) -> f64 {
        if self.default_bpm.is_finite() && self.default_bpm > 0.0 {
            self.default_bpm
        } else {
            Self::default().default_bpm
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Time constant for gain / pan / master changes (seconds).
    pub smoothing_secs: f64,
    /// Extra wall time added to the end-of-track timer.
    pub end_timer_slack_secs: f64,
    /// How long the beat LED stays lit after a beat boundary.
    pub beat_flash_secs: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            smoothing_secs: 0.02,
            end_timer_slack_secs: 0.05,
            beat_flash_secs: 0.08,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
    /// Percent of full scale reached by an average bin value of 255.
    pub scale: f32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            fft_size: 64,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            scale: 150.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub stem_colors: HashMap<String, String>,
    pub fallback_color: String,
    pub ruler_height: f64,
    pub placeholder_bins: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let stem_colors = [
            ("drums", "#f87171"),
            ("bass", "#60a5fa"),
            ("vocals", "#fbbf24"),
            ("other", "#a78bfa"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            stem_colors,
            fallback_color: "#888888".to_string(),
            ruler_height: 28.0,
            placeholder_bins: 80,
        }
    }
}

impl DisplayConfig {
    pub fn color_for(&self, stem: &str) -> &str {
        self.stem_colors
            .get(stem)
            .map(String::as_str)
            .unwrap_or(&self.fallback_color)
    }
}

impl EditorConfig {
    pub fn load_from_disk(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_disk(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating config {}", path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_disk(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.tempo.default_bpm, 120.0);
        assert_eq!(config.tempo.default_time_signature, "4/4");
        assert_eq!(config.meter.fft_size, 64);
        assert_eq!(config.display.color_for("bass"), "#60a5fa");
        assert_eq!(config.display.color_for("cowbell"), "#888888");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "api_base": "https://beats.example", "tempo": { "max_bpm": 240.0 } }"#;
        let config: EditorConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.api_base, "https://beats.example");
        assert_eq!(config.tempo.max_bpm, 240.0);
        assert_eq!(config.tempo.min_bpm, 20.0);
        assert_eq!(config.transport.smoothing_secs, 0.02);
    }

    #[test]
    fn test_bpm_range_is_ordered() {
        let mut tempo = TempoConfig::default();
        assert_eq!(tempo.bpm_range(), (20.0, 300.0));

        tempo.min_bpm = 200.0;
        tempo.max_bpm = 100.0;
        assert_eq!(tempo.bpm_range(), (100.0, 200.0));

        tempo.min_bpm = f64::NAN;
        tempo.max_bpm = -5.0;
        assert_eq!(tempo.bpm_range(), (20.0, 300.0));

        tempo.min_bpm = 400.0;
        tempo.max_bpm = f64::INFINITY;
        assert_eq!(tempo.bpm_range(), (300.0, 400.0));

        tempo.default_bpm = f64::NAN;
        assert_eq!(tempo.fallback_bpm(), 120.0);
    }

    #[test]
    fn test_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");

        let mut config = EditorConfig::default();
        config.tempo.default_bpm = 92.0;
        config.display.ruler_height = 32.0;
        config.save_to_disk(&path).unwrap();

        let loaded = EditorConfig::load_from_disk(&path).unwrap();
        assert_eq!(loaded.tempo.default_bpm, 92.0);
        assert_eq!(loaded.display.ruler_height, 32.0);
    }
}
