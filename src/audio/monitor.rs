//! Live monitor output — the playback branch of the graph fan-out.
//!
//! [`Monitor`] is the seam the graph pump writes processed audio to.
//! [`CpalMonitor`] plays it on the default output device so the user hears
//! the shifted signal while it is being captured; [`NullMonitor`] discards
//! it (headless sessions, tests).
//!
//! `cpal::Stream` is not `Send`, so the output stream lives on a dedicated
//! `monitor-out` thread that owns it for the stream's whole lifetime. The
//! pump thread only touches a shared sample queue.

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample;

/// Maximum buffered monitor audio in seconds; older samples are dropped so a
/// stalled output device cannot grow the queue without bound.
const MAX_QUEUE_SECS: usize = 2;

// ---------------------------------------------------------------------------
// Monitor trait
// ---------------------------------------------------------------------------

/// Sink for the live playback branch of the audio graph.
///
/// Implementations must be `Send`; `write` is called from the graph pump
/// thread once per processed chunk and must not block on the audio device.
pub trait Monitor: Send {
    /// Queue processed mono samples (at the graph sample rate) for playback.
    fn write(&mut self, samples: &[f32]);
}

// ---------------------------------------------------------------------------
// NullMonitor
// ---------------------------------------------------------------------------

/// Monitor that discards everything. Used when live playback is disabled or
/// no output device is available.
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn write(&mut self, _samples: &[f32]) {}
}

// ---------------------------------------------------------------------------
// MonitorError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up the monitor output stream.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(String),

    #[error("failed to start output stream: {0}")]
    PlayStream(String),

    #[error("monitor thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// CpalMonitor
// ---------------------------------------------------------------------------

/// Live playback on the default cpal output device.
///
/// Samples written at the graph rate are resampled to the device rate and
/// drained by the output callback; when the queue runs dry the callback
/// plays silence rather than blocking.
pub struct CpalMonitor {
    queue: Arc<Mutex<VecDeque<f32>>>,
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
    source_rate: u32,
    device_rate: u32,
}

impl CpalMonitor {
    /// Spawn the `monitor-out` thread and start playback.
    ///
    /// `source_rate` is the rate of the samples the graph will write.
    ///
    /// # Errors
    ///
    /// Any device/stream setup failure is reported back from the monitor
    /// thread before this function returns.
    pub fn spawn(source_rate: u32) -> Result<Self, MonitorError> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, MonitorError>>();

        let cb_queue = Arc::clone(&queue);
        let join = std::thread::Builder::new()
            .name("monitor-out".into())
            .spawn(move || run_output_stream(cb_queue, stop_rx, ready_tx))
            .map_err(|e| MonitorError::Thread(e.to_string()))?;

        let device_rate = ready_rx
            .recv()
            .map_err(|_| MonitorError::Thread("monitor thread exited during setup".into()))??;

        Ok(Self {
            queue,
            stop_tx: Some(stop_tx),
            join: Some(join),
            source_rate,
            device_rate,
        })
    }

    /// Sample rate of the output device in Hz.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

impl Monitor for CpalMonitor {
    fn write(&mut self, samples: &[f32]) {
        let converted = resample(samples, self.source_rate, self.device_rate);

        let mut queue = match self.queue.lock() {
            Ok(q) => q,
            Err(_) => return, // callback panicked; nothing left to feed
        };
        queue.extend(converted);

        let cap = self.device_rate as usize * MAX_QUEUE_SECS;
        let excess = queue.len().saturating_sub(cap);
        if excess > 0 {
            queue.drain(..excess);
        }
    }
}

impl Drop for CpalMonitor {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Body of the `monitor-out` thread: build and own the cpal output stream,
/// report setup outcome over `ready_tx`, then block until stopped.
fn run_output_stream(
    queue: Arc<Mutex<VecDeque<f32>>>,
    stop_rx: mpsc::Receiver<()>,
    ready_tx: mpsc::Sender<Result<u32, MonitorError>>,
) {
    let setup = move || -> Result<(cpal::Stream, u32), MonitorError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(MonitorError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| MonitorError::DefaultConfig(e.to_string()))?;

        let device_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match queue.lock() {
                        Ok(q) => q,
                        Err(_) => {
                            data.fill(0.0);
                            return;
                        }
                    };
                    for frame in data.chunks_mut(channels) {
                        let s = queue.pop_front().unwrap_or(0.0);
                        frame.fill(s);
                    }
                },
                |err: cpal::StreamError| {
                    log::error!("monitor stream error: {err}");
                },
                None,
            )
            .map_err(|e| MonitorError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| MonitorError::PlayStream(e.to_string()))?;

        Ok((stream, device_rate))
    };

    match setup() {
        Ok((stream, device_rate)) => {
            let _ = ready_tx.send(Ok(device_rate));
            // Keep the stream alive until the owner drops its handle.
            let _ = stop_rx.recv();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_monitor_accepts_writes() {
        let mut m = NullMonitor;
        m.write(&[0.1, 0.2, 0.3]);
        m.write(&[]);
    }

    #[test]
    fn monitor_trait_is_object_safe() {
        let mut m: Box<dyn Monitor> = Box::new(NullMonitor);
        m.write(&[0.0; 16]);
    }

    #[test]
    fn monitor_error_display_names_the_device() {
        let e = MonitorError::NoDevice;
        assert!(e.to_string().contains("output device"));
    }
}
