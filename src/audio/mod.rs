//! Audio primitives — chunks, channel downmix, resampling, pitch shifting,
//! live monitoring.
//!
//! # Pipeline
//!
//! ```text
//! AudioSource → AudioChunk (mpsc) → stereo_to_mono → PitchShifter
//!            → Monitor (live playback) + CaptureSink (recording)
//! ```
//!
//! The pitch-shift parameter is shared through [`PitchParam`], an atomic
//! cell that the session controller can retune at any time while the graph
//! pump thread keeps processing — no locks on the audio path.

pub mod monitor;
pub mod pitch;
pub mod resample;

pub use monitor::{CpalMonitor, Monitor, MonitorError, NullMonitor};
pub use pitch::{PitchParam, PitchShifter, MAX_SEMITONES, MIN_SEMITONES};
pub use resample::{resample, stereo_to_mono};

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by an input source.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}
