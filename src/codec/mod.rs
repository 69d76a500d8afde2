//! Codec engine — one-time asynchronous load, then raw-in / encoded-out.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │               CodecEngine (trait)                 │
//! │                                                   │
//! │   FfmpegEngine ── probe binary once ──▶ Ready     │
//! │        │                                          │
//! │        ▼                                          │
//! │   transcode(RawContainer)                         │
//! │     temp dir: input.wav ─ffmpeg recipe─▶ out.mp3  │
//! └───────────────────────────────────────────────────┘
//!            ▲
//!            │ Arc<dyn CodecEngine>
//! ┌──────────┴────────────────────────────────────────┐
//! │ CodecAdapter                                      │
//! │  - ensure_loaded(): memoized single-flight load   │
//! │  - transcode(): encoded bytes + ArtifactHandle    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The fixed conversion recipe resamples to 44.1 kHz, remixes to 2 channels
//! and encodes MP3 at a 192 kbit/s target — lossy but duration-preserving.

pub mod adapter;
pub mod artifact;
pub mod engine;

pub use adapter::{CodecAdapter, EngineState};
pub use artifact::{ArtifactHandle, EncodedArtifact, DEFAULT_ARTIFACT_NAME, ENCODED_MEDIA_TYPE};
pub use engine::{CodecEngine, CodecError, FfmpegEngine, TranscodeRecipe};

#[cfg(test)]
pub use engine::MockCodecEngine;
