//! Core codec engine trait and the ffmpeg-backed implementation.
//!
//! [`CodecEngine`] is the object-safe interface the adapter drives. The
//! production implementation, [`FfmpegEngine`], shells out to the system
//! `ffmpeg` binary: the raw container is written to a named file in a
//! private temp directory (the engine's virtual input), the fixed recipe is
//! invoked, and the named output file is read back.
//!
//! [`MockCodecEngine`] (under `#[cfg(test)]`) scripts load/transcode
//! outcomes and counts load invocations so the adapter's single-flight
//! guarantee can be unit-tested.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::recorder::RawContainer;

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// All errors that can arise from the codec subsystem.
///
/// `Clone` so a cached load failure can be handed to every later caller.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The engine could not be initialised; permanent for the process
    /// lifetime.
    #[error("codec engine failed to load: {0}")]
    LoadFailed(String),

    /// The conversion recipe failed; carries the engine diagnostic.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// A transcode was requested before the engine reached `Ready`.
    #[error("codec engine is not ready")]
    NotReady,
}

// ---------------------------------------------------------------------------
// TranscodeRecipe
// ---------------------------------------------------------------------------

/// The fixed argument recipe for the conversion step.
#[derive(Debug, Clone)]
pub struct TranscodeRecipe {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Target bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

impl Default for TranscodeRecipe {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bitrate_kbps: 192,
        }
    }
}

// ---------------------------------------------------------------------------
// CodecEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for transcoding engines.
///
/// `load` is the heavyweight one-time initialisation; callers go through
/// [`crate::codec::CodecAdapter`], which guarantees it runs at most once per
/// process. `transcode` converts one raw container into encoded bytes.
#[async_trait]
pub trait CodecEngine: Send + Sync {
    /// Initialise the engine. Expensive; called at most once.
    async fn load(&self) -> Result<(), CodecError>;

    /// Convert `raw` using the fixed recipe and return the encoded bytes.
    async fn transcode(&self, raw: &RawContainer) -> Result<Vec<u8>, CodecError>;
}

// Compile-time assertion: Box<dyn CodecEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CodecEngine>) {}
};

// ---------------------------------------------------------------------------
// FfmpegEngine
// ---------------------------------------------------------------------------

/// Production engine backed by the system `ffmpeg` binary.
pub struct FfmpegEngine {
    /// Explicit binary path from configuration; `None` means `ffmpeg` on
    /// `PATH`.
    binary_override: Option<PathBuf>,
    /// Resolved binary, set exactly once by a successful `load`.
    binary: OnceLock<PathBuf>,
    recipe: TranscodeRecipe,
}

impl FfmpegEngine {
    pub fn new(binary_override: Option<PathBuf>, recipe: TranscodeRecipe) -> Self {
        Self {
            binary_override,
            binary: OnceLock::new(),
            recipe,
        }
    }

    /// The recipe this engine applies.
    pub fn recipe(&self) -> &TranscodeRecipe {
        &self.recipe
    }

    fn candidate(&self) -> PathBuf {
        self.binary_override
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }
}

#[async_trait]
impl CodecEngine for FfmpegEngine {
    /// Probe the binary with `-version`. Success caches the resolved path.
    async fn load(&self) -> Result<(), CodecError> {
        let candidate = self.candidate();
        log::info!("probing codec engine: {}", candidate.display());

        let output = Command::new(&candidate)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CodecError::LoadFailed(format!("{}: {e}", candidate.display())))?;

        if !output.status.success() {
            return Err(CodecError::LoadFailed(format!(
                "{} -version exited with {}",
                candidate.display(),
                output.status
            )));
        }

        let _ = self.binary.set(candidate);
        Ok(())
    }

    async fn transcode(&self, raw: &RawContainer) -> Result<Vec<u8>, CodecError> {
        let binary = self.binary.get().ok_or(CodecError::NotReady)?;

        // Virtual input/output: a private temp directory holding the named
        // files the recipe reads and writes.
        let dir = tempfile::tempdir()
            .map_err(|e| CodecError::Transcode(format!("temp dir: {e}")))?;
        let input = dir.path().join("input.wav");
        let output = dir.path().join("output.mp3");

        tokio::fs::write(&input, &raw.bytes)
            .await
            .map_err(|e| CodecError::Transcode(format!("write input: {e}")))?;

        let status_output = Command::new(binary)
            .arg("-y")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(&input)
            .args(["-ar", &self.recipe.sample_rate.to_string()])
            .args(["-ac", &self.recipe.channels.to_string()])
            .args(["-b:a", &format!("{}k", self.recipe.bitrate_kbps)])
            .args(["-codec:a", "libmp3lame"])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CodecError::Transcode(format!("spawn {}: {e}", binary.display())))?;

        if !status_output.status.success() {
            let diagnostic = String::from_utf8_lossy(&status_output.stderr);
            return Err(CodecError::Transcode(diagnostic.trim().to_string()));
        }

        tokio::fs::read(&output)
            .await
            .map_err(|e| CodecError::Transcode(format!("read output: {e}")))
    }
}

// ---------------------------------------------------------------------------
// MockCodecEngine  (test-only)
// ---------------------------------------------------------------------------

/// Test double with scripted outcomes and a load-invocation counter.
///
/// A successful transcode returns the input frame count in the first eight
/// bytes so duration propagation can be asserted without a real encoder.
#[cfg(test)]
pub struct MockCodecEngine {
    load_result: Result<(), CodecError>,
    transcode_result: Result<(), CodecError>,
    load_delay: std::time::Duration,
    load_calls: std::sync::atomic::AtomicUsize,
    transcode_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCodecEngine {
    /// Engine that loads and transcodes successfully.
    pub fn ok() -> Self {
        Self {
            load_result: Ok(()),
            transcode_result: Ok(()),
            load_delay: std::time::Duration::from_millis(0),
            load_calls: std::sync::atomic::AtomicUsize::new(0),
            transcode_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Engine whose load takes `delay` (for concurrency tests).
    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            load_delay: delay,
            ..Self::ok()
        }
    }

    /// Engine that fails to load.
    pub fn failing_load(message: &str) -> Self {
        Self {
            load_result: Err(CodecError::LoadFailed(message.into())),
            ..Self::ok()
        }
    }

    /// Engine that loads but fails every transcode.
    pub fn failing_transcode(message: &str) -> Self {
        Self {
            transcode_result: Err(CodecError::Transcode(message.into())),
            ..Self::ok()
        }
    }

    /// How many times `load` ran.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// How many times `transcode` ran.
    pub fn transcode_calls(&self) -> usize {
        self.transcode_calls
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Frame count embedded in a mock transcode output.
    pub fn decode_frames(bytes: &[u8]) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(buf)
    }
}

#[cfg(test)]
#[async_trait]
impl CodecEngine for MockCodecEngine {
    async fn load(&self) -> Result<(), CodecError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.load_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.load_result.clone()
    }

    async fn transcode(&self, raw: &RawContainer) -> Result<Vec<u8>, CodecError> {
        self.transcode_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.transcode_result.clone()?;

        let mut bytes = raw.frames.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"MOCK-MP3");
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RAW_MEDIA_TYPE;

    fn empty_raw() -> RawContainer {
        RawContainer {
            bytes: Vec::new(),
            media_type: RAW_MEDIA_TYPE,
            sample_rate: 44_100,
            channels: 1,
            frames: 0,
        }
    }

    #[test]
    fn default_recipe_matches_the_distribution_target() {
        let recipe = TranscodeRecipe::default();
        assert_eq!(recipe.sample_rate, 44_100);
        assert_eq!(recipe.channels, 2);
        assert_eq!(recipe.bitrate_kbps, 192);
    }

    #[tokio::test]
    async fn ffmpeg_transcode_before_load_is_not_ready() {
        let engine = FfmpegEngine::new(None, TranscodeRecipe::default());
        let err = engine.transcode(&empty_raw()).await.unwrap_err();
        assert!(matches!(err, CodecError::NotReady));
    }

    #[tokio::test]
    async fn ffmpeg_load_with_bogus_binary_fails() {
        let engine = FfmpegEngine::new(
            Some(PathBuf::from("/nonexistent/ffmpeg-binary")),
            TranscodeRecipe::default(),
        );
        let err = engine.load().await.unwrap_err();
        assert!(matches!(err, CodecError::LoadFailed(_)));
    }

    #[tokio::test]
    async fn mock_counts_load_calls() {
        let engine = MockCodecEngine::ok();
        engine.load().await.unwrap();
        engine.load().await.unwrap();
        assert_eq!(engine.load_calls(), 2);
    }

    #[tokio::test]
    async fn mock_embeds_frame_count() {
        let engine = MockCodecEngine::ok();
        engine.load().await.unwrap();

        let mut raw = empty_raw();
        raw.frames = 12_345;
        let bytes = engine.transcode(&raw).await.unwrap();
        assert_eq!(MockCodecEngine::decode_frames(&bytes), 12_345);
    }

    #[test]
    fn codec_error_display_carries_diagnostic() {
        let e = CodecError::Transcode("Invalid data found when processing input".into());
        assert!(e.to_string().contains("Invalid data"));
    }
}
