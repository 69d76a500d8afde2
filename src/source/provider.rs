//! Source provider trait, input descriptors and the source error taxonomy.

use std::path::Path;
use std::sync::{mpsc, Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioChunk;
use crate::source::{FileSource, MicSource};

// ---------------------------------------------------------------------------
// InputMode
// ---------------------------------------------------------------------------

/// Where the session's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    /// Live capture from the default input device.
    Microphone,
    /// Playback of a previously chosen, already-resolved file.
    File,
}

impl Default for InputMode {
    fn default() -> Self {
        Self::Microphone
    }
}

// ---------------------------------------------------------------------------
// InputFile
// ---------------------------------------------------------------------------

/// A user-chosen input file: display name plus resolved bytes.
///
/// Immutable once chosen; replacing the selection has no effect on a session
/// that is already running. Bytes are shared behind an `Arc` so cloning the
/// descriptor never copies the audio data.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Display name (usually the original file name).
    pub name: String,
    /// Raw container bytes (WAV).
    pub bytes: Arc<Vec<u8>>,
}

impl InputFile {
    /// Wrap in-memory bytes as an input file.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes),
        }
    }

    /// Read an input file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::FileUnreadable`] when the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| SourceError::FileUnreadable(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".into());
        Ok(Self::new(name, bytes))
    }
}

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// All errors that can arise while acquiring or starting an input source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The platform refused access to the input device.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device, or the device rejected the stream.
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// File mode was requested but no file has been selected.
    #[error("no input file selected")]
    NoFileSelected,

    /// The selected file could not be read or decoded.
    #[error("input file unreadable: {0}")]
    FileUnreadable(String),
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// A playable source node resolved by the provider.
///
/// The node is inert until [`start`](Self::start) is called (by the audio
/// graph, once the processing chain is connected), and must be
/// [`release`](Self::release)d exactly once per acquisition — `release` is
/// idempotent so error paths can call it unconditionally.
pub trait AudioSource: Send + std::fmt::Debug {
    /// Begin producing [`AudioChunk`]s into `tx`.
    ///
    /// For the microphone this starts the capture stream; for a file this
    /// starts real-time paced playback of the decoded buffer.
    fn start(&mut self, tx: mpsc::Sender<AudioChunk>) -> Result<(), SourceError>;

    /// Native sample rate of the produced chunks in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels in the produced chunks.
    fn channels(&self) -> u16;

    /// Stop producing and close the underlying device/playback. Idempotent.
    fn release(&mut self);
}

// Compile-time assertion: Box<dyn AudioSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioSource>) {}
};

// ---------------------------------------------------------------------------
// SourceProvider
// ---------------------------------------------------------------------------

/// Resolves an [`InputMode`] into a playable [`AudioSource`].
///
/// Object-safe and `Send + Sync` so the session controller can hold it
/// behind an `Arc<dyn SourceProvider>` and tests can substitute scripted
/// sources.
pub trait SourceProvider: Send + Sync {
    /// Acquire a source for `mode`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NoFileSelected`] — `mode` is [`InputMode::File`] and
    ///   `file` is `None`. Checked before any device or decode work.
    /// - [`SourceError::PermissionDenied`] / [`SourceError::DeviceUnavailable`]
    ///   — microphone grant/open failed.
    /// - [`SourceError::FileUnreadable`] — the file bytes do not decode.
    fn acquire(
        &self,
        mode: InputMode,
        file: Option<&InputFile>,
    ) -> Result<Box<dyn AudioSource>, SourceError>;
}

/// Production provider backed by cpal (microphone) and hound (file decode).
pub struct SystemSourceProvider;

impl SourceProvider for SystemSourceProvider {
    fn acquire(
        &self,
        mode: InputMode,
        file: Option<&InputFile>,
    ) -> Result<Box<dyn AudioSource>, SourceError> {
        match mode {
            InputMode::Microphone => {
                let source = MicSource::acquire()?;
                Ok(Box::new(source))
            }
            InputMode::File => {
                // Rejected before any engine/device resources are allocated.
                let file = file.ok_or(SourceError::NoFileSelected)?;
                let source = FileSource::decode(file)?;
                Ok(Box::new(source))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_input_mode_is_microphone() {
        assert_eq!(InputMode::default(), InputMode::Microphone);
    }

    #[test]
    fn file_mode_without_file_is_rejected_first() {
        let provider = SystemSourceProvider;
        let err = provider.acquire(InputMode::File, None).unwrap_err();
        assert!(matches!(err, SourceError::NoFileSelected));
    }

    #[test]
    fn input_file_clone_shares_bytes() {
        let file = InputFile::new("a.wav", vec![1, 2, 3]);
        let clone = file.clone();
        assert!(Arc::ptr_eq(&file.bytes, &clone.bytes));
        assert_eq!(clone.name, "a.wav");
    }

    #[test]
    fn input_file_from_missing_path_is_unreadable() {
        let err = InputFile::from_path("/nonexistent/audio.wav").unwrap_err();
        assert!(matches!(err, SourceError::FileUnreadable(_)));
    }

    #[test]
    fn source_error_display_no_file() {
        assert!(SourceError::NoFileSelected
            .to_string()
            .contains("no input file"));
    }
}
