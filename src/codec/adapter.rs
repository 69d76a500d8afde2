//! Codec engine adapter — memoized load plus artifact publication.
//!
//! The engine is process-wide and loaded at most once. [`CodecAdapter`]
//! guards that with a single shared pending-result cell
//! ([`tokio::sync::OnceCell`]): concurrent `ensure_loaded` callers all await
//! the same in-flight load, and once the outcome is known (`Ready` or
//! `LoadFailed`) every later call returns it immediately. A boolean flag
//! checked-then-acted-upon would race under concurrent callers; the cell
//! cannot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::codec::artifact::{ArtifactHandle, EncodedArtifact, DEFAULT_ARTIFACT_NAME, ENCODED_MEDIA_TYPE};
use crate::codec::engine::{CodecEngine, CodecError};
use crate::recorder::RawContainer;

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Observable lifecycle of the shared codec engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// `ensure_loaded` has never been called.
    Unloaded,
    /// A load is in flight; callers are awaiting its outcome.
    Loading,
    /// The engine accepts transcode requests.
    Ready,
    /// The load failed; permanent for the process lifetime.
    LoadFailed,
}

// ---------------------------------------------------------------------------
// CodecAdapter
// ---------------------------------------------------------------------------

/// Owns the engine lifecycle and turns transcode results into published
/// artifacts.
pub struct CodecAdapter {
    engine: Arc<dyn CodecEngine>,
    load_outcome: OnceCell<Result<(), CodecError>>,
    loading: AtomicBool,
    output_dir: PathBuf,
    /// Distinguishes artifact files across sessions of one process.
    seq: AtomicU64,
}

impl CodecAdapter {
    /// Create an adapter writing artifacts into `output_dir`.
    pub fn new(engine: Arc<dyn CodecEngine>, output_dir: PathBuf) -> Self {
        Self {
            engine,
            load_outcome: OnceCell::new(),
            loading: AtomicBool::new(false),
            output_dir,
            seq: AtomicU64::new(0),
        }
    }

    /// Current engine lifecycle state.
    pub fn state(&self) -> EngineState {
        match self.load_outcome.get() {
            Some(Ok(())) => EngineState::Ready,
            Some(Err(_)) => EngineState::LoadFailed,
            None if self.loading.load(Ordering::SeqCst) => EngineState::Loading,
            None => EngineState::Unloaded,
        }
    }

    /// Load the engine exactly once; idempotent and single-flight.
    ///
    /// The first caller triggers the load; concurrent callers await the same
    /// in-flight operation; later callers get the cached outcome.
    pub async fn ensure_loaded(&self) -> Result<(), CodecError> {
        self.load_outcome
            .get_or_init(|| async {
                self.loading.store(true, Ordering::SeqCst);
                let outcome = self.engine.load().await;
                self.loading.store(false, Ordering::SeqCst);
                if let Err(ref e) = outcome {
                    log::error!("codec engine load failed: {e}");
                } else {
                    log::info!("codec engine ready");
                }
                outcome
            })
            .await
            .clone()
    }

    /// Transcode `raw` and publish the result as a fresh artifact.
    ///
    /// The caller owns invalidating any previously published handle.
    ///
    /// # Errors
    ///
    /// - [`CodecError::NotReady`] — the engine has not been loaded.
    /// - [`CodecError::LoadFailed`] — the cached load outcome is a failure.
    /// - [`CodecError::Transcode`] — the recipe failed, or the artifact file
    ///   could not be written.
    pub async fn transcode(&self, raw: &RawContainer) -> Result<EncodedArtifact, CodecError> {
        match self.load_outcome.get() {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e.clone()),
            None => return Err(CodecError::NotReady),
        }

        log::info!(
            "transcoding {:.2}s raw capture ({} bytes)",
            raw.duration_secs(),
            raw.bytes.len()
        );
        let bytes = self.engine.transcode(raw).await?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CodecError::Transcode(format!("output dir: {e}")))?;

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let path = self.output_dir.join(format!("tuned_recording-{seq}.mp3"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| CodecError::Transcode(format!("write artifact: {e}")))?;

        log::info!("artifact published: {} ({} bytes)", path.display(), bytes.len());

        Ok(EncodedArtifact {
            bytes,
            media_type: ENCODED_MEDIA_TYPE,
            download_name: DEFAULT_ARTIFACT_NAME.to_string(),
            handle: ArtifactHandle::new(path),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::engine::MockCodecEngine;
    use crate::recorder::RAW_MEDIA_TYPE;
    use std::time::Duration;

    fn raw_with_frames(frames: u64) -> RawContainer {
        RawContainer {
            bytes: vec![0u8; 44],
            media_type: RAW_MEDIA_TYPE,
            sample_rate: 44_100,
            channels: 1,
            frames,
        }
    }

    fn adapter_with(engine: Arc<MockCodecEngine>) -> (CodecAdapter, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CodecAdapter::new(engine, dir.path().to_path_buf());
        (adapter, dir)
    }

    // ---- ensure_loaded -----------------------------------------------------

    #[tokio::test]
    async fn concurrent_loads_run_exactly_one_underlying_load() {
        let engine = Arc::new(MockCodecEngine::slow(Duration::from_millis(50)));
        let (adapter, _dir) = adapter_with(Arc::clone(&engine));

        let (a, b) = tokio::join!(adapter.ensure_loaded(), adapter.ensure_loaded());
        a.unwrap();
        b.unwrap();

        assert_eq!(engine.load_calls(), 1);
        assert_eq!(adapter.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn repeated_loads_return_cached_outcome() {
        let engine = Arc::new(MockCodecEngine::ok());
        let (adapter, _dir) = adapter_with(Arc::clone(&engine));

        adapter.ensure_loaded().await.unwrap();
        adapter.ensure_loaded().await.unwrap();
        adapter.ensure_loaded().await.unwrap();

        assert_eq!(engine.load_calls(), 1);
    }

    #[tokio::test]
    async fn load_failure_is_cached_and_permanent() {
        let engine = Arc::new(MockCodecEngine::failing_load("wasm fetch failed"));
        let (adapter, _dir) = adapter_with(Arc::clone(&engine));

        let first = adapter.ensure_loaded().await.unwrap_err();
        let second = adapter.ensure_loaded().await.unwrap_err();

        assert!(matches!(first, CodecError::LoadFailed(_)));
        assert!(matches!(second, CodecError::LoadFailed(_)));
        assert_eq!(engine.load_calls(), 1);
        assert_eq!(adapter.state(), EngineState::LoadFailed);
    }

    #[tokio::test]
    async fn state_starts_unloaded() {
        let engine = Arc::new(MockCodecEngine::ok());
        let (adapter, _dir) = adapter_with(engine);
        assert_eq!(adapter.state(), EngineState::Unloaded);
    }

    // ---- transcode ---------------------------------------------------------

    #[tokio::test]
    async fn transcode_before_load_is_rejected() {
        let engine = Arc::new(MockCodecEngine::ok());
        let (adapter, _dir) = adapter_with(Arc::clone(&engine));

        let err = adapter.transcode(&raw_with_frames(100)).await.unwrap_err();
        assert!(matches!(err, CodecError::NotReady));
        assert_eq!(engine.transcode_calls(), 0);
    }

    #[tokio::test]
    async fn transcode_after_failed_load_returns_the_load_error() {
        let engine = Arc::new(MockCodecEngine::failing_load("no binary"));
        let (adapter, _dir) = adapter_with(Arc::clone(&engine));
        let _ = adapter.ensure_loaded().await;

        let err = adapter.transcode(&raw_with_frames(100)).await.unwrap_err();
        assert!(matches!(err, CodecError::LoadFailed(_)));
        assert_eq!(engine.transcode_calls(), 0);
    }

    #[tokio::test]
    async fn transcode_publishes_a_readable_artifact() {
        let engine = Arc::new(MockCodecEngine::ok());
        let (adapter, _dir) = adapter_with(engine);
        adapter.ensure_loaded().await.unwrap();

        let artifact = adapter.transcode(&raw_with_frames(44_100)).await.unwrap();

        assert_eq!(artifact.media_type, ENCODED_MEDIA_TYPE);
        assert_eq!(artifact.download_name, DEFAULT_ARTIFACT_NAME);
        // Duration-preserving at the mock level: the frame count round-trips.
        assert_eq!(MockCodecEngine::decode_frames(&artifact.bytes), 44_100);

        let path = artifact.handle.path().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }

    #[tokio::test]
    async fn successive_artifacts_get_distinct_handles() {
        let engine = Arc::new(MockCodecEngine::ok());
        let (adapter, _dir) = adapter_with(engine);
        adapter.ensure_loaded().await.unwrap();

        let first = adapter.transcode(&raw_with_frames(10)).await.unwrap();
        let second = adapter.transcode(&raw_with_frames(20)).await.unwrap();

        assert_ne!(first.handle.path(), second.handle.path());
    }

    #[tokio::test]
    async fn transcode_failure_carries_the_diagnostic() {
        let engine = Arc::new(MockCodecEngine::failing_transcode("bad container"));
        let (adapter, _dir) = adapter_with(engine);
        adapter.ensure_loaded().await.unwrap();

        let err = adapter.transcode(&raw_with_frames(5)).await.unwrap_err();
        match err {
            CodecError::Transcode(msg) => assert!(msg.contains("bad container")),
            other => panic!("expected Transcode, got {other:?}"),
        }
    }
}
