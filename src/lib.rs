// src/lib.rs

pub mod audio;
pub mod audio_runtime;
pub mod config;
pub mod decoder;
pub mod editor;
pub mod engine;
pub mod error;
pub mod loader;
pub mod session;
pub mod waveform;

pub use audio_runtime::StemRuntime;
pub use config::EditorConfig;
pub use editor::StemEditor;
pub use engine::{Transport, TransportState};
pub use error::TransportError;
pub use loader::{DefaultFetcher, StemFetcher};
pub use session::{ExportedMix, MixdownJob};
