//! Audio graph manager — wires source → pitch shift → fan-out.
//!
//! # Topology
//!
//! ```text
//! AudioSource ──AudioChunk (mpsc)──▶ graph-pump thread
//!                                        │ downmix to mono
//!                                        │ PitchShifter (live PitchParam)
//!                                        ├─▶ Monitor (live playback)
//!                                        └─▶ CaptureSink (PCM fragments)
//! ```
//!
//! The manager exclusively owns the source, effect and sink handles for the
//! session's duration; the session controller only receives the narrow
//! [`PitchParam`] setter. `disconnect` tears the whole chain down, releases
//! the source exactly once, and is idempotent.

use std::sync::mpsc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::audio::{stereo_to_mono, AudioChunk, Monitor, PitchParam, PitchShifter};
use crate::recorder::{pcm_fragment, CaptureSink};
use crate::source::{AudioSource, SourceError};

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Errors that can occur while connecting the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The source failed to start producing audio.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The pump thread could not be spawned.
    #[error("failed to start graph pump: {0}")]
    Pump(String),
}

// ---------------------------------------------------------------------------
// AudioGraphManager
// ---------------------------------------------------------------------------

struct ActiveGraph {
    source: Box<dyn AudioSource>,
    pitch: PitchParam,
    pump: Option<JoinHandle<()>>,
}

/// Builds and tears down the processing chain for one session at a time.
///
/// At most one source/sink pair is connected at any moment; connecting while
/// a graph is active tears the old one down first, so restarts can never
/// leave orphaned nodes behind.
pub struct AudioGraphManager {
    active: Option<ActiveGraph>,
}

impl AudioGraphManager {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// `true` while a chain is connected.
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    /// Connect `source` through a pitch-shift effect into `sink` and
    /// `monitor`, then start the source.
    ///
    /// Returns the shared pitch parameter for live retuning.
    ///
    /// # Errors
    ///
    /// On failure everything already set up is torn down again; the source
    /// is released before the error is returned.
    pub fn connect(
        &mut self,
        mut source: Box<dyn AudioSource>,
        semitones: f32,
        sink: CaptureSink,
        monitor: Box<dyn Monitor>,
    ) -> Result<PitchParam, GraphError> {
        self.disconnect();

        let pitch = PitchParam::new(semitones);
        let shifter = PitchShifter::new(source.sample_rate(), pitch.clone());
        let (tx, rx) = mpsc::channel::<AudioChunk>();

        let pump = std::thread::Builder::new()
            .name("graph-pump".into())
            .spawn(move || run_pump(rx, shifter, sink, monitor))
            .map_err(|e| {
                source.release();
                GraphError::Pump(e.to_string())
            })?;

        // The source starts only after the chain is in place, so capture and
        // live playback begin in lockstep (file mode starts playing here).
        if let Err(e) = source.start(tx) {
            source.release();
            let _ = pump.join();
            return Err(e.into());
        }

        log::debug!(
            "graph connected: {} Hz, {} ch, {semitones} st",
            source.sample_rate(),
            source.channels()
        );

        self.active = Some(ActiveGraph {
            source,
            pitch: pitch.clone(),
            pump: Some(pump),
        });
        Ok(pitch)
    }

    /// Retune the live effect. Silently does nothing when no graph is
    /// connected — continuous adjustment must never interrupt the stream,
    /// and there is no stream to interrupt.
    pub fn set_pitch(&self, semitones: f32) {
        if let Some(graph) = &self.active {
            graph.pitch.set(semitones);
        }
    }

    /// Current live pitch value, if a graph is connected.
    pub fn pitch(&self) -> Option<f32> {
        self.active.as_ref().map(|g| g.pitch.get())
    }

    /// Tear down the chain: release the source, drain and join the pump,
    /// drop the monitor. Idempotent — a no-op when nothing is connected.
    ///
    /// Joining the pump before returning is what guarantees the capture
    /// sink has received every produced fragment (finalization
    /// happens-after the last append).
    pub fn disconnect(&mut self) {
        if let Some(mut graph) = self.active.take() {
            graph.source.release();
            if let Some(pump) = graph.pump.take() {
                let _ = pump.join();
            }
            log::debug!("graph disconnected");
        }
    }
}

impl Default for AudioGraphManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioGraphManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Body of the `graph-pump` thread: drain source chunks until the channel
/// closes, shifting and fanning out each one.
fn run_pump(
    rx: mpsc::Receiver<AudioChunk>,
    mut shifter: PitchShifter,
    sink: CaptureSink,
    mut monitor: Box<dyn Monitor>,
) {
    while let Ok(chunk) = rx.recv() {
        let mono = stereo_to_mono(&chunk.samples, chunk.channels);
        let shifted = shifter.process(&mono);

        // Fan-out: both branches receive the processed signal.
        monitor.write(&shifted);
        sink.push(pcm_fragment(&shifted));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
