//! Live microphone source via `cpal`.
//!
//! Acquisition opens the default input device and queries its preferred
//! configuration — this is the grant/open step that can fail with
//! `PermissionDenied` or `DeviceUnavailable`. The capture stream itself is
//! built later, on a dedicated `mic-capture` thread, because `cpal::Stream`
//! is not `Send` and the session controller moves across runtime workers.

use std::sync::{mpsc, Arc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::AudioChunk;
use crate::source::{AudioSource, SourceError};

/// Map a cpal failure message onto the source error taxonomy. Platforms
/// report permission problems as backend-specific errors, so the wording is
/// the only signal available.
fn classify(message: String) -> SourceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted")
    {
        SourceError::PermissionDenied(message)
    } else {
        SourceError::DeviceUnavailable(message)
    }
}

// ---------------------------------------------------------------------------
// MicSource
// ---------------------------------------------------------------------------

/// Microphone source node.
///
/// Created by [`MicSource::acquire`]; starts capturing when the audio graph
/// calls [`AudioSource::start`]; releases the device when the graph
/// disconnects.
#[derive(Debug)]
pub struct MicSource {
    sample_rate: u32,
    channels: u16,
    released: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl MicSource {
    /// Open the default input device and validate its configuration.
    ///
    /// # Errors
    ///
    /// - [`SourceError::DeviceUnavailable`] — no input device present.
    /// - [`SourceError::PermissionDenied`] — the platform refused access.
    pub fn acquire() -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            SourceError::DeviceUnavailable("no input device found on the default host".into())
        })?;

        let supported = device
            .default_input_config()
            .map_err(|e| classify(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        log::debug!("mic acquired: {sample_rate} Hz, {channels} ch");

        Ok(Self {
            sample_rate,
            channels,
            released: Arc::new(AtomicBool::new(false)),
            join: None,
        })
    }
}

impl AudioSource for MicSource {
    fn start(&mut self, tx: mpsc::Sender<AudioChunk>) -> Result<(), SourceError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SourceError>>();
        let released = Arc::clone(&self.released);
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let join = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                run_capture_stream(tx, ready_tx, released, sample_rate, channels);
            })
            .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

        self.join = Some(join);

        ready_rx.recv().map_err(|_| {
            SourceError::DeviceUnavailable("mic-capture thread exited during setup".into())
        })?
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Body of the `mic-capture` thread: build and own the cpal input stream,
/// report setup outcome, then poll the release flag.
fn run_capture_stream(
    tx: mpsc::Sender<AudioChunk>,
    ready_tx: mpsc::Sender<Result<(), SourceError>>,
    released: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
) {
    let setup = move || -> Result<cpal::Stream, SourceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            SourceError::DeviceUnavailable("input device disappeared before start".into())
        })?;

        let supported = device
            .default_input_config()
            .map_err(|e| classify(e.to_string()))?;
        let config: cpal::StreamConfig = supported.into();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let chunk = AudioChunk {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                    };
                    // Ignore send errors; the receiver may have been dropped.
                    let _ = tx.send(chunk);
                },
                |err: cpal::StreamError| {
                    log::error!("mic stream error: {err}");
                },
                None,
            )
            .map_err(|e| classify(e.to_string()))?;

        stream.play().map_err(|e| classify(e.to_string()))?;
        Ok(stream)
    };

    match setup() {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            while !released.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(20));
            }
            drop(stream);
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
