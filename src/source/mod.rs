//! Input source resolution — microphone or decoded file.
//!
//! # Architecture
//!
//! ```text
//! InputMode::Microphone ─▶ MicSource  (cpal, dedicated mic-capture thread)
//! InputMode::File       ─▶ FileSource (hound WAV decode, paced playback)
//!                │
//!                ▼
//!       Box<dyn AudioSource> ──start(tx)──▶ AudioChunk stream
//! ```
//!
//! [`SourceProvider::acquire`] resolves a mode (plus an optional
//! [`InputFile`]) into a playable source node. The node does not produce
//! audio until the audio graph calls [`AudioSource::start`], so in file mode
//! playback and capture begin in lockstep. [`AudioSource::release`] is
//! idempotent and closes the device / stops playback exactly once.

pub mod file;
pub mod mic;
pub mod provider;

pub use file::FileSource;
pub use mic::MicSource;
pub use provider::{
    AudioSource, InputFile, InputMode, SourceError, SourceProvider, SystemSourceProvider,
};
