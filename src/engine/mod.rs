// src/engine/mod.rs

pub mod buffer;
pub mod clock;
pub mod gain;
pub mod metering;
pub mod mixer;
pub mod readout;
pub mod time;
pub mod track;
pub mod transport;

pub use buffer::AudioBuffer;
pub use clock::{AudioClock, FrameClock, ManualClock};
pub use mixer::MixGraph;
pub use readout::{LedState, PitchDirection, PitchShift, Readout};
pub use time::{format_clock, TempoMap, TimeSignature};
pub use track::{LoadStatus, Track};
pub use transport::{rebase_clock, Transport, TransportState};
