//! Session controller — drives the record → stop → transcode lifecycle.
//!
//! The controller owns the audio graph, the capture recorder and the codec
//! adapter, and is the only place session state transitions happen. User
//! operations map onto it directly:
//!
//! - `start` — acquire the configured input, connect the graph, arm capture
//! - `set_pitch` — live retune, valid in any state, never a transition
//! - `stop` — tear down, finalize the capture, transcode, publish
//!
//! Invalid operations (`stop` while idle, `start` while recording) are
//! rejected with [`SessionError::InvalidTransition`] and leave the session
//! untouched.

use std::sync::Arc;

use thiserror::Error;

use crate::audio::{CpalMonitor, Monitor, NullMonitor, MAX_SEMITONES, MIN_SEMITONES};
use crate::codec::{CodecAdapter, CodecError, EncodedArtifact};
use crate::graph::{AudioGraphManager, GraphError};
use crate::recorder::CaptureRecorder;
use crate::session::state::{SessionSnapshot, SessionState};
use crate::source::{InputFile, InputMode, SourceError, SourceProvider};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Everything a session operation can fail with.
///
/// `Clone` so the latest failure can be kept on the controller for snapshots
/// while also being returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Acquiring or starting the input source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The codec engine failed to load or transcode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The raw capture could not be finalized.
    #[error("capture finalization failed: {0}")]
    Finalize(String),

    /// The audio graph broke outside of a source error.
    #[error("audio graph failure: {0}")]
    Graph(String),

    /// The requested operation is not valid in the current state.
    #[error("cannot {op} while {}", state.label())]
    InvalidTransition {
        op: &'static str,
        state: SessionState,
    },
}

impl From<GraphError> for SessionError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Source(s) => Self::Source(s),
            GraphError::Pump(m) => Self::Graph(m),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns one session at a time and everything it records into.
pub struct SessionController {
    provider: Arc<dyn SourceProvider>,
    codec: Arc<CodecAdapter>,
    graph: AudioGraphManager,
    recorder: CaptureRecorder,

    state: SessionState,
    input_mode: InputMode,
    input_file: Option<InputFile>,
    pitch_semitones: f32,
    monitor_enabled: bool,
    last_error: Option<SessionError>,
    /// The previous session's published artifact; its handle is invalidated
    /// when the next session starts.
    artifact: Option<EncodedArtifact>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        codec: Arc<CodecAdapter>,
        default_pitch: f32,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            provider,
            codec,
            graph: AudioGraphManager::new(),
            recorder: CaptureRecorder::new(),
            state: SessionState::Idle,
            input_mode: InputMode::default(),
            input_file: None,
            pitch_semitones: clamp_semitones(default_pitch),
            monitor_enabled,
            last_error: None,
            artifact: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Point-in-time view for status output.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            input_mode: self.input_mode,
            pitch_semitones: self.pitch_semitones,
            error: self.last_error.as_ref().map(|e| e.to_string()),
            artifact_path: self
                .artifact
                .as_ref()
                .and_then(|a| a.handle.path())
                .map(|p| p.to_path_buf()),
        }
    }

    /// The currently published artifact, if the last session completed.
    pub fn artifact(&self) -> Option<&EncodedArtifact> {
        self.artifact.as_ref()
    }

    /// Choose the input mode for the next session. Sessions already running
    /// keep the source they started with.
    pub fn set_input_mode(&mut self, mode: InputMode) {
        self.input_mode = mode;
    }

    /// Choose (or clear) the input file for the next file-mode session.
    pub fn set_input_file(&mut self, file: Option<InputFile>) {
        self.input_file = file;
    }

    /// Start a new session.
    ///
    /// Valid from `Idle`, `Done` and `Failed`. The previous artifact handle
    /// (if any) is invalidated, the configured input is acquired, the graph
    /// is connected with the current pitch preference, and capture arms.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] when called in any other state.
    /// Source and graph failures move the session to `Failed`, with anything
    /// partially acquired released on the way.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if !self.state.can_start() {
            return Err(SessionError::InvalidTransition {
                op: "start",
                state: self.state,
            });
        }

        self.last_error = None;
        if let Some(mut previous) = self.artifact.take() {
            previous.handle.invalidate();
        }

        self.state = SessionState::Acquiring;
        log::info!("session starting ({:?} mode)", self.input_mode);

        // Device enumeration and file decode can block; keep them off the
        // async runtime.
        let provider = Arc::clone(&self.provider);
        let mode = self.input_mode;
        let file = self.input_file.clone();
        let acquired = match tokio::task::spawn_blocking(move || provider.acquire(mode, file.as_ref()))
            .await
        {
            Ok(result) => result,
            Err(e) => return Err(self.fail(SessionError::Graph(e.to_string()))),
        };

        let source = match acquired {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e.into())),
        };

        // Capture is armed before the graph connects so the very first pumped
        // fragment lands in the sink. The pump downmixes to mono.
        self.recorder.start(source.sample_rate(), 1);

        let monitor = self.build_monitor(source.sample_rate());
        let connected = self.graph.connect(
            source,
            self.pitch_semitones,
            self.recorder.sink(),
            monitor,
        );
        if let Err(e) = connected {
            let _ = self.recorder.stop();
            return Err(self.fail(e.into()));
        }

        self.state = SessionState::Recording;
        log::info!("session recording");
        Ok(())
    }

    /// Adjust the pitch preference, retuning the live effect if one is
    /// connected. Valid in every state and never a transition; out-of-range
    /// and non-finite values are clamped.
    pub fn set_pitch(&mut self, semitones: f32) {
        self.pitch_semitones = clamp_semitones(semitones);
        self.graph.set_pitch(self.pitch_semitones);
    }

    /// Current pitch preference in semitones.
    pub fn pitch(&self) -> f32 {
        self.pitch_semitones
    }

    /// Stop the running session: tear down the graph, finalize the capture
    /// and transcode it into a published artifact.
    ///
    /// Only valid while `Recording`; rejected anywhere else without touching
    /// the capture or any published artifact.
    ///
    /// # Errors
    ///
    /// Finalization and codec failures move the session to `Failed`; the raw
    /// capture is discarded either way.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Recording {
            return Err(SessionError::InvalidTransition {
                op: "stop",
                state: self.state,
            });
        }

        self.state = SessionState::Stopping;
        log::info!("session stopping");

        // Joins the pump, so every produced fragment is in the sink before
        // finalization reads it.
        self.graph.disconnect();

        let raw = match self.recorder.stop() {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(SessionError::Finalize(e.to_string()))),
        };

        self.state = SessionState::Transcoding;
        log::info!("capture finalized ({:.2}s), transcoding", raw.duration_secs());

        if let Err(e) = self.codec.ensure_loaded().await {
            return Err(self.fail(e.into()));
        }
        let artifact = match self.codec.transcode(&raw).await {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.artifact = Some(artifact);
        self.state = SessionState::Done;
        log::info!("session done");
        Ok(())
    }

    fn build_monitor(&self, source_rate: u32) -> Box<dyn Monitor> {
        if !self.monitor_enabled {
            return Box::new(NullMonitor);
        }
        match CpalMonitor::spawn(source_rate) {
            Ok(monitor) => Box::new(monitor),
            Err(e) => {
                // Live playback is an extra; capture proceeds without it.
                log::warn!("monitor unavailable, recording without playback: {e}");
                Box::new(NullMonitor)
            }
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        log::error!("session failed: {err}");
        self.graph.disconnect();
        self.state = SessionState::Failed;
        self.last_error = Some(err.clone());
        err
    }
}

fn clamp_semitones(semitones: f32) -> f32 {
    if semitones.is_finite() {
        semitones.clamp(MIN_SEMITONES, MAX_SEMITONES)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
