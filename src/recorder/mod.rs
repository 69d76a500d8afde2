//! Capture recorder — accumulates processed PCM fragments and finalizes
//! them into a single raw WAV container.
//!
//! The graph pump pushes binary fragments into a [`CaptureSink`] (the
//! capture destination of the fan-out); [`CaptureRecorder::stop`]
//! concatenates every fragment in arrival order under a WAV header and
//! clears the buffer so the next session starts empty.
//!
//! Fragments are raw 16-bit little-endian PCM — not independently decodable,
//! which is why arrival order is preserved byte-for-byte. The sink only
//! accepts fragments while armed, enforcing that chunks are appended solely
//! during the `Recording` phase.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Media type of the finalized raw container.
pub const RAW_MEDIA_TYPE: &str = "audio/wav";

// ---------------------------------------------------------------------------
// Fragment encoding
// ---------------------------------------------------------------------------

/// Encode mono `f32` samples as a 16-bit little-endian PCM fragment.
///
/// This is the wire format between the graph pump and the capture sink.
pub fn pcm_fragment(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

// ---------------------------------------------------------------------------
// RecorderError
// ---------------------------------------------------------------------------

/// Errors that can occur while finalizing a capture.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The WAV container could not be written.
    #[error("failed to finalize raw container: {0}")]
    Finalize(String),
}

// ---------------------------------------------------------------------------
// RawContainer
// ---------------------------------------------------------------------------

/// The finalized, unprocessed capture: a complete WAV byte stream plus the
/// format needed to interpret it.
#[derive(Debug, Clone)]
pub struct RawContainer {
    /// Complete container bytes (header + data).
    pub bytes: Vec<u8>,
    /// Fixed container media type ([`RAW_MEDIA_TYPE`]).
    pub media_type: &'static str,
    /// Sample rate of the captured audio in Hz.
    pub sample_rate: u32,
    /// Channel count of the captured audio.
    pub channels: u16,
    /// Number of sample frames in the data section.
    pub frames: u64,
}

impl RawContainer {
    /// Decodable duration of the capture in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// `true` when no audio frames were captured.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

// ---------------------------------------------------------------------------
// CaptureSink
// ---------------------------------------------------------------------------

/// Cloneable handle to the capture destination.
///
/// The graph pump holds one clone and appends fragments; the recorder holds
/// another and controls arming/finalization. Appends while the sink is not
/// armed are silently dropped.
#[derive(Clone)]
pub struct CaptureSink {
    inner: Arc<Mutex<SinkBuffer>>,
}

struct SinkBuffer {
    fragments: Vec<Vec<u8>>,
    armed: bool,
}

impl CaptureSink {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkBuffer {
                fragments: Vec::new(),
                armed: false,
            })),
        }
    }

    /// Append one fragment, preserving arrival order.
    ///
    /// Empty fragments are ignored, as are fragments arriving while the sink
    /// is not armed.
    pub fn push(&self, fragment: Vec<u8>) {
        if fragment.is_empty() {
            return;
        }
        if let Ok(mut buf) = self.inner.lock() {
            if buf.armed {
                buf.fragments.push(fragment);
            }
        }
    }

    fn set_armed(&self, armed: bool) {
        if let Ok(mut buf) = self.inner.lock() {
            buf.armed = armed;
        }
    }

    fn take(&self) -> Vec<Vec<u8>> {
        match self.inner.lock() {
            Ok(mut buf) => std::mem::take(&mut buf.fragments),
            Err(_) => Vec::new(),
        }
    }

    /// Number of buffered fragments (diagnostics and tests).
    pub fn len(&self) -> usize {
        self.inner.lock().map(|b| b.fragments.len()).unwrap_or(0)
    }

    /// `true` when no fragments are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// CaptureRecorder
// ---------------------------------------------------------------------------

/// Owns the capture buffer for one session at a time.
///
/// ```rust
/// use tuned::recorder::{pcm_fragment, CaptureRecorder};
///
/// let mut recorder = CaptureRecorder::new();
/// let sink = recorder.sink();
///
/// recorder.start(44_100, 1);
/// sink.push(pcm_fragment(&[0.0, 0.25, -0.25]));
/// let raw = recorder.stop().unwrap();
/// assert_eq!(raw.frames, 3);
/// ```
pub struct CaptureRecorder {
    sink: CaptureSink,
    sample_rate: u32,
    channels: u16,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self {
            sink: CaptureSink::new(),
            sample_rate: 0,
            channels: 0,
        }
    }

    /// Handle for the producing side (passed to the audio graph).
    pub fn sink(&self) -> CaptureSink {
        self.sink.clone()
    }

    /// Arm the sink for a new session capturing at the given format.
    ///
    /// Any stale fragments from an aborted session are discarded first.
    pub fn start(&mut self, sample_rate: u32, channels: u16) {
        let _ = self.sink.take();
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.sink.set_armed(true);
    }

    /// Disarm and finalize: concatenate every buffered fragment, in arrival
    /// order, into one WAV container, then clear the buffer.
    ///
    /// Zero captured fragments produce a well-formed empty container — a
    /// defined outcome, not an error.
    pub fn stop(&mut self) -> Result<RawContainer, RecorderError> {
        self.sink.set_armed(false);
        let fragments = self.sink.take();

        let sample_rate = self.sample_rate.max(1);
        let channels = self.channels.max(1);

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut samples: u64 = 0;
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| RecorderError::Finalize(e.to_string()))?;

            for fragment in &fragments {
                for pair in fragment.chunks_exact(2) {
                    let v = i16::from_le_bytes([pair[0], pair[1]]);
                    writer
                        .write_sample(v)
                        .map_err(|e| RecorderError::Finalize(e.to_string()))?;
                    samples += 1;
                }
            }

            writer
                .finalize()
                .map_err(|e| RecorderError::Finalize(e.to_string()))?;
        }

        let frames = samples / channels as u64;
        log::debug!(
            "capture finalized: {} fragments, {frames} frames @ {sample_rate} Hz",
            fragments.len()
        );

        Ok(RawContainer {
            bytes: cursor.into_inner(),
            media_type: RAW_MEDIA_TYPE,
            sample_rate,
            channels,
            frames,
        })
    }
}

impl Default for CaptureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(raw: &RawContainer) -> Vec<i16> {
        let reader = hound::WavReader::new(Cursor::new(raw.bytes.as_slice())).unwrap();
        reader.into_samples::<i16>().map(|s| s.unwrap()).collect()
    }

    // ---- pcm_fragment ------------------------------------------------------

    #[test]
    fn fragment_encodes_little_endian_i16() {
        let bytes = pcm_fragment(&[0.0, 1.0, -1.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 0);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
    }

    #[test]
    fn fragment_clamps_out_of_range_samples() {
        let bytes = pcm_fragment(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -i16::MAX);
    }

    // ---- zero fragments ----------------------------------------------------

    #[test]
    fn zero_fragments_yield_well_formed_empty_container() {
        let mut recorder = CaptureRecorder::new();
        recorder.start(44_100, 1);
        let raw = recorder.stop().unwrap();

        assert!(raw.is_empty());
        assert_eq!(raw.media_type, RAW_MEDIA_TYPE);
        assert_eq!(raw.duration_secs(), 0.0);
        // The container must still parse as WAV.
        assert!(read_back(&raw).is_empty());
    }

    // ---- ordering ----------------------------------------------------------

    #[test]
    fn fragments_are_concatenated_in_arrival_order() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();
        recorder.start(8_000, 1);

        let a: Vec<i16> = (0..100).collect();
        let b: Vec<i16> = (1_000..1_100).collect();
        let c: Vec<i16> = (-50..50).collect();
        for frag in [&a, &b, &c] {
            let bytes: Vec<u8> = frag.iter().flat_map(|v| v.to_le_bytes()).collect();
            sink.push(bytes);
        }

        let raw = recorder.stop().unwrap();
        let expected: Vec<i16> = a.into_iter().chain(b).chain(c).collect();
        assert_eq!(read_back(&raw), expected);
        assert_eq!(raw.frames, 300);
    }

    // ---- arming ------------------------------------------------------------

    #[test]
    fn pushes_before_start_are_dropped() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();

        sink.push(vec![1, 2]);
        assert!(sink.is_empty());

        recorder.start(8_000, 1);
        sink.push(vec![1, 2]);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn pushes_after_stop_are_dropped() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();
        recorder.start(8_000, 1);
        let _ = recorder.stop().unwrap();

        sink.push(vec![1, 2]);
        assert!(sink.is_empty());
    }

    #[test]
    fn empty_fragments_are_ignored() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();
        recorder.start(8_000, 1);
        sink.push(Vec::new());
        assert!(sink.is_empty());
    }

    #[test]
    fn stop_clears_buffer_for_next_session() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();

        recorder.start(8_000, 1);
        sink.push(pcm_fragment(&[0.5; 64]));
        let first = recorder.stop().unwrap();
        assert_eq!(first.frames, 64);

        recorder.start(8_000, 1);
        let second = recorder.stop().unwrap();
        assert!(second.is_empty());
    }

    // ---- duration ----------------------------------------------------------

    #[test]
    fn duration_matches_captured_frames() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();
        recorder.start(8_000, 1);
        // 2 seconds at 8 kHz mono.
        sink.push(pcm_fragment(&vec![0.1_f32; 16_000]));

        let raw = recorder.stop().unwrap();
        assert!((raw.duration_secs() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn stale_fragments_discarded_on_restart() {
        let mut recorder = CaptureRecorder::new();
        let sink = recorder.sink();
        recorder.start(8_000, 1);
        sink.push(pcm_fragment(&[0.2; 32]));

        // Session aborted without stop(); the next start must not inherit data.
        recorder.start(8_000, 1);
        let raw = recorder.stop().unwrap();
        assert!(raw.is_empty());
    }
}
