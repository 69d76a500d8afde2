//! Encoded output artifacts and their transient access handles.
//!
//! Each completed session publishes one [`EncodedArtifact`]: the encoded
//! bytes plus an [`ArtifactHandle`] pointing at the file written for
//! playback/download. Handles are transient — publishing a new artifact
//! invalidates the previous one, which removes its file. The artifact that
//! is never superseded keeps its file for the user.

use std::path::{Path, PathBuf};

/// Fixed default filename convention for the encoded output.
pub const DEFAULT_ARTIFACT_NAME: &str = "tuned_recording.mp3";

/// Media type of the encoded output.
pub const ENCODED_MEDIA_TYPE: &str = "audio/mpeg";

// ---------------------------------------------------------------------------
// ArtifactHandle
// ---------------------------------------------------------------------------

/// Transient access handle to an encoded artifact file.
///
/// Valid until [`invalidate`](Self::invalidate) is called; invalidation
/// removes the backing file and is idempotent.
#[derive(Debug)]
pub struct ArtifactHandle {
    path: PathBuf,
    valid: bool,
}

impl ArtifactHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, valid: true }
    }

    /// Path to the artifact file, or `None` once invalidated.
    pub fn path(&self) -> Option<&Path> {
        self.valid.then_some(self.path.as_path())
    }

    /// `true` until the handle is invalidated.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Invalidate the handle and remove the backing file. Idempotent.
    pub fn invalidate(&mut self) {
        if !self.valid {
            return;
        }
        self.valid = false;
        if let Err(e) = std::fs::remove_file(&self.path) {
            // The file may already be gone; anything else is worth a trace.
            log::debug!("artifact cleanup ({}): {e}", self.path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// EncodedArtifact
// ---------------------------------------------------------------------------

/// The final, distributable compressed audio output.
#[derive(Debug)]
pub struct EncodedArtifact {
    /// Encoded audio bytes.
    pub bytes: Vec<u8>,
    /// Media type of `bytes` ([`ENCODED_MEDIA_TYPE`]).
    pub media_type: &'static str,
    /// Suggested filename for a download affordance
    /// ([`DEFAULT_ARTIFACT_NAME`]).
    pub download_name: String,
    /// Transient access handle to the written file.
    pub handle: ArtifactHandle,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_exposes_path_while_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"x").unwrap();

        let mut handle = ArtifactHandle::new(path.clone());
        assert!(handle.is_valid());
        assert_eq!(handle.path(), Some(path.as_path()));

        handle.invalidate();
        assert!(!handle.is_valid());
        assert_eq!(handle.path(), None);
        assert!(!path.exists());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.mp3");
        std::fs::write(&path, b"x").unwrap();

        let mut handle = ArtifactHandle::new(path);
        handle.invalidate();
        handle.invalidate();
        assert!(!handle.is_valid());
    }

    #[test]
    fn invalidate_survives_missing_file() {
        let mut handle = ArtifactHandle::new(PathBuf::from("/nonexistent/z.mp3"));
        handle.invalidate();
        assert!(!handle.is_valid());
    }
}
