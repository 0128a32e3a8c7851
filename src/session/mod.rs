// src/session/mod.rs

pub mod export;
pub mod wav;

pub use export::{export_filename, ExportedMix, MixdownJob, MixdownPlan, WAV_MIME};
pub use wav::encode_wav;
