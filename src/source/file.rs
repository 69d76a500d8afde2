//! File source — decodes a chosen WAV byte buffer into a playable node.
//!
//! Decoding happens eagerly at acquisition so format problems surface before
//! the session reaches `Recording`. Playback is paced in real time on a
//! `file-playback` thread so the live monitor branch and the capture sink
//! hear the file at its natural speed, exactly as a microphone would deliver
//! it.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::AudioChunk;
use crate::source::{AudioSource, InputFile, SourceError};

/// Frames per playback chunk (~23 ms at 44.1 kHz).
const CHUNK_FRAMES: usize = 1024;

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Playable node backed by a decoded WAV buffer.
#[derive(Debug)]
pub struct FileSource {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    stopped: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FileSource {
    /// Decode `file` into interleaved `f32` samples.
    ///
    /// Accepts integer (8–32 bit) and float WAV data.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::FileUnreadable`] when the bytes are not a
    /// decodable WAV container.
    pub fn decode(file: &InputFile) -> Result<Self, SourceError> {
        let unreadable =
            |e: &dyn std::fmt::Display| SourceError::FileUnreadable(format!("{}: {e}", file.name));

        let mut reader = hound::WavReader::new(Cursor::new(file.bytes.as_slice()))
            .map_err(|e| unreadable(&e))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| unreadable(&e))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| unreadable(&e))?
            }
        };

        log::debug!(
            "file decoded: {} ({} Hz, {} ch, {} samples)",
            file.name,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            samples: Arc::new(samples),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            stopped: Arc::new(AtomicBool::new(false)),
            join: None,
        })
    }

    /// Duration of the decoded audio in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

impl AudioSource for FileSource {
    fn start(&mut self, tx: mpsc::Sender<AudioChunk>) -> Result<(), SourceError> {
        let samples = Arc::clone(&self.samples);
        let stopped = Arc::clone(&self.stopped);
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let join = std::thread::Builder::new()
            .name("file-playback".into())
            .spawn(move || {
                let chunk_len = CHUNK_FRAMES * channels.max(1) as usize;
                let chunk_dur = Duration::from_secs_f64(
                    CHUNK_FRAMES as f64 / sample_rate.max(1) as f64,
                );
                let mut deadline = Instant::now();

                let mut windows = samples.chunks(chunk_len).peekable();
                while let Some(window) = windows.next() {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }

                    let chunk = AudioChunk {
                        samples: window.to_vec(),
                        sample_rate,
                        channels,
                    };
                    if tx.send(chunk).is_err() {
                        break; // graph disconnected
                    }

                    // Pace against a fixed deadline so drift never accumulates.
                    if windows.peek().is_some() {
                        deadline += chunk_dur;
                        let now = Instant::now();
                        if deadline > now {
                            std::thread::sleep(deadline - now);
                        }
                    }
                }
            })
            .map_err(|e| SourceError::FileUnreadable(e.to_string()))?;

        self.join = Some(join);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn release(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an in-memory 16-bit WAV with the given frames.
    fn wav_bytes(sample_rate: u32, channels: u16, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in frames {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decode_reads_spec_and_samples() {
        let bytes = wav_bytes(8_000, 1, &[0, 16_384, -16_384, 0]);
        let file = InputFile::new("test.wav", bytes);
        let source = FileSource::decode(&file).unwrap();

        assert_eq!(source.sample_rate(), 8_000);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.samples.len(), 4);
        assert!((source.samples[1] - 0.5).abs() < 1e-3);
        assert!((source.samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn decode_garbage_is_unreadable() {
        let file = InputFile::new("junk.bin", vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let err = FileSource::decode(&file).unwrap_err();
        assert!(matches!(err, SourceError::FileUnreadable(_)));
    }

    #[test]
    fn duration_accounts_for_channels() {
        // 1 second of stereo at 8 kHz = 16 000 interleaved samples.
        let frames = vec![0i16; 16_000];
        let file = InputFile::new("stereo.wav", wav_bytes(8_000, 2, &frames));
        let source = FileSource::decode(&file).unwrap();
        assert!((source.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn playback_delivers_all_samples_in_order() {
        let frames: Vec<i16> = (0..2_048).map(|i| (i % 100) as i16 * 100).collect();
        let file = InputFile::new("play.wav", wav_bytes(8_000, 1, &frames));
        let mut source = FileSource::decode(&file).unwrap();
        let expected = source.samples.as_slice().to_vec();

        let (tx, rx) = mpsc::channel();
        source.start(tx).unwrap();

        let mut received = Vec::new();
        while let Ok(chunk) = rx.recv() {
            assert_eq!(chunk.sample_rate, 8_000);
            assert_eq!(chunk.channels, 1);
            received.extend(chunk.samples);
        }
        source.release();

        assert_eq!(received, expected);
    }

    #[test]
    fn release_is_idempotent() {
        let file = InputFile::new("t.wav", wav_bytes(8_000, 1, &[0i16; 64]));
        let mut source = FileSource::decode(&file).unwrap();
        source.release();
        source.release();
    }
}
