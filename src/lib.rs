//! Tuned — real-time pitch-shift recording pipeline.
//!
//! # Architecture
//!
//! ```text
//! InputMode (mic / file)
//!        │
//!        ▼
//! SourceProvider::acquire ──▶ Box<dyn AudioSource>
//!        │
//!        ▼
//! AudioGraphManager::connect
//!        │  source chunks ─▶ downmix ─▶ PitchShifter ─┬─▶ Monitor (live)
//!        │                                            └─▶ CaptureSink
//!        ▼
//! CaptureRecorder (ordered PCM fragments) ──stop──▶ RawContainer (WAV)
//!        │
//!        ▼
//! CodecAdapter::transcode (ffmpeg, 44.1 kHz / 2 ch / 192 kbit/s MP3)
//!        │
//!        ▼
//! EncodedArtifact (+ transient file handle)
//! ```
//!
//! [`session::SessionController`] drives the lifecycle:
//! `Idle → Acquiring → Recording → Stopping → Transcoding → Done | Failed`.
//! The presentation layer (the CLI in `main.rs`, or any future UI) calls
//! `start` / `stop` / `set_pitch` and observes [`session::SessionSnapshot`].

pub mod audio;
pub mod codec;
pub mod config;
pub mod graph;
pub mod recorder;
pub mod session;
pub mod source;
