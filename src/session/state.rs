//! Session lifecycle states and the snapshot handed to front ends.

use std::path::PathBuf;

use crate::source::InputMode;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of one recording session.
///
/// ```text
/// Idle ─▶ Acquiring ─▶ Recording ─▶ Stopping ─▶ Transcoding ─▶ Done
///             │                                      │           │
///             └───────────▶ Failed ◀─────────────────┘   (restartable)
/// ```
///
/// `Done` and `Failed` are both restartable: a new `start` begins the next
/// session from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has run yet.
    Idle,
    /// Resolving and starting the input source.
    Acquiring,
    /// Audio is flowing through the graph into the capture sink.
    Recording,
    /// Tearing down the graph and finalizing the capture.
    Stopping,
    /// The raw container is being converted to the distribution format.
    Transcoding,
    /// An artifact was published; ready for the next session.
    Done,
    /// The session ended in an error; ready for the next session.
    Failed,
}

impl SessionState {
    /// `true` during the transitional phases where no user operation is
    /// accepted.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Stopping | Self::Transcoding)
    }

    /// `true` in the states a new session may start from.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Done | Self::Failed)
    }

    /// Short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring input",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Transcoding => "transcoding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the controller for status output and UIs.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub input_mode: InputMode,
    /// Current pitch preference in semitones (clamped).
    pub pitch_semitones: f32,
    /// Rendered error from the most recent failure, if any.
    pub error: Option<String>,
    /// Path of the currently published artifact, if one is valid.
    pub artifact_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
