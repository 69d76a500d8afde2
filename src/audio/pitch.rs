//! Live-tunable pitch shifting.
//!
//! [`PitchParam`] is the single live-mutable parameter of the audio graph: an
//! atomic semitone cell shared between the session controller (which retunes
//! it on user input) and the graph pump thread (which reads it every chunk).
//!
//! [`PitchShifter`] is a delay-line granular shifter: two read taps sweep a
//! short delay line at a rate of `2^(semitones/12)` relative to the write
//! head, crossfaded by offset triangular windows so the stream stays
//! continuous while the parameter moves. Output duration always equals input
//! duration — only the perceived pitch changes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lowest accepted pitch shift, one octave down.
pub const MIN_SEMITONES: f32 = -12.0;
/// Highest accepted pitch shift, one octave up.
pub const MAX_SEMITONES: f32 = 12.0;

/// Grain length of the delay-line shifter in seconds.
const GRAIN_SECS: f32 = 0.1;

// ---------------------------------------------------------------------------
// PitchParam
// ---------------------------------------------------------------------------

/// Shared, lock-free pitch parameter in semitones.
///
/// Cloning shares the underlying cell. Values are clamped to
/// [`MIN_SEMITONES`, `MAX_SEMITONES`] on every write, and non-finite input
/// is treated as `0.0`.
///
/// # Example
///
/// ```rust
/// use tuned::audio::PitchParam;
///
/// let param = PitchParam::new(3.0);
/// let shared = param.clone();
/// shared.set(5.0);
/// assert_eq!(param.get(), 5.0);
/// ```
#[derive(Debug, Clone)]
pub struct PitchParam(Arc<AtomicU32>);

impl PitchParam {
    /// Create a new parameter cell holding `semitones` (clamped).
    pub fn new(semitones: f32) -> Self {
        let cell = Self(Arc::new(AtomicU32::new(0)));
        cell.set(semitones);
        cell
    }

    /// Update the parameter. Takes effect on the next processed chunk.
    pub fn set(&self, semitones: f32) {
        let clamped = if semitones.is_finite() {
            semitones.clamp(MIN_SEMITONES, MAX_SEMITONES)
        } else {
            0.0
        };
        self.0.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Current value in semitones.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Playback-rate factor for the current value: `2^(semitones/12)`.
    pub fn factor(&self) -> f32 {
        2.0_f32.powf(self.get() / 12.0)
    }
}

impl Default for PitchParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ---------------------------------------------------------------------------
// PitchShifter
// ---------------------------------------------------------------------------

/// Mono delay-line granular pitch shifter.
///
/// Feed consecutive chunks through [`process`](Self::process); the shifter
/// keeps its delay line across calls so chunk boundaries are seamless. The
/// semitone value is re-read from the shared [`PitchParam`] once per chunk.
pub struct PitchShifter {
    param: PitchParam,
    /// Circular delay line; capacity covers two grains plus a small guard.
    buf: Vec<f32>,
    write_pos: usize,
    /// Grain sweep phase in `[0, 1)`.
    phase: f32,
    /// Grain length in samples at the graph sample rate.
    grain: f32,
}

impl PitchShifter {
    /// Create a shifter for mono audio at `sample_rate` Hz.
    pub fn new(sample_rate: u32, param: PitchParam) -> Self {
        let grain = (sample_rate as f32 * GRAIN_SECS).max(64.0);
        let capacity = grain as usize * 2 + 8;
        Self {
            param,
            buf: vec![0.0; capacity],
            write_pos: 0,
            phase: 0.0,
            grain,
        }
    }

    /// Handle to the shared semitone parameter.
    pub fn param(&self) -> PitchParam {
        self.param.clone()
    }

    /// Clear the delay line (between sessions).
    pub fn reset(&mut self) {
        self.buf.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }

    /// Process one chunk of mono samples, producing exactly
    /// `input.len()` output samples.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let factor = self.param.factor();
        // Per-sample phase drift; zero when factor == 1.0 (no shift).
        let incr = (1.0 - factor) / self.grain;

        let mut out = Vec::with_capacity(input.len());
        for &x in input {
            self.buf[self.write_pos] = x;
            self.write_pos = (self.write_pos + 1) % self.buf.len();

            let p1 = self.phase;
            let p2 = (self.phase + 0.5).fract();

            let y1 = self.read_tap(p1 * self.grain);
            let y2 = self.read_tap(p2 * self.grain);

            // Offset triangular windows; w1 + w2 == 1 for every phase.
            let w1 = 1.0 - (2.0 * p1 - 1.0).abs();
            let w2 = 1.0 - (2.0 * p2 - 1.0).abs();

            out.push(y1 * w1 + y2 * w2);

            self.phase = (self.phase + incr).rem_euclid(1.0);
        }
        out
    }

    /// Read the delay line `delay` samples behind the write head with linear
    /// interpolation. `delay` is always within `[0, grain)`, well inside the
    /// line's capacity.
    fn read_tap(&self, delay: f32) -> f32 {
        let capacity = self.buf.len();
        let pos = (self.write_pos + capacity) as f32 - 1.0 - delay;
        let pos = pos.rem_euclid(capacity as f32);

        let i0 = pos as usize % capacity;
        let i1 = (i0 + 1) % capacity;
        let frac = pos - pos.floor();

        self.buf[i0] * (1.0 - frac) + self.buf[i1] * frac
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- PitchParam --------------------------------------------------------

    #[test]
    fn param_round_trips_value() {
        let p = PitchParam::new(3.5);
        assert_eq!(p.get(), 3.5);
        p.set(-7.25);
        assert_eq!(p.get(), -7.25);
    }

    #[test]
    fn param_clamps_to_range() {
        let p = PitchParam::new(0.0);
        p.set(20.0);
        assert_eq!(p.get(), MAX_SEMITONES);
        p.set(-20.0);
        assert_eq!(p.get(), MIN_SEMITONES);
    }

    #[test]
    fn param_rejects_non_finite() {
        let p = PitchParam::new(f32::NAN);
        assert_eq!(p.get(), 0.0);
        p.set(f32::INFINITY);
        assert_eq!(p.get(), 0.0);
    }

    #[test]
    fn param_clones_share_the_cell() {
        let a = PitchParam::new(0.0);
        let b = a.clone();
        b.set(5.0);
        assert_eq!(a.get(), 5.0);
    }

    #[test]
    fn factor_matches_equal_temperament() {
        let p = PitchParam::new(12.0);
        assert!((p.factor() - 2.0).abs() < 1e-6);
        p.set(-12.0);
        assert!((p.factor() - 0.5).abs() < 1e-6);
        p.set(0.0);
        assert!((p.factor() - 1.0).abs() < 1e-6);
    }

    // ---- PitchShifter ------------------------------------------------------

    #[test]
    fn output_length_equals_input_length() {
        let mut s = PitchShifter::new(44_100, PitchParam::new(5.0));
        for chunk_len in [1usize, 63, 512, 4_096] {
            let out = s.process(&vec![0.1_f32; chunk_len]);
            assert_eq!(out.len(), chunk_len);
        }
    }

    #[test]
    fn silence_in_silence_out() {
        let mut s = PitchShifter::new(44_100, PitchParam::new(7.0));
        let out = s.process(&vec![0.0_f32; 10_000]);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn dc_signal_survives_shifting() {
        // Crossfaded taps sum to unity, so a DC signal must come out intact
        // once the delay line has warmed up.
        let mut s = PitchShifter::new(8_000, PitchParam::new(4.0));
        let grain = (8_000.0 * GRAIN_SECS) as usize;
        let out = s.process(&vec![0.5_f32; grain * 4]);

        for &x in &out[grain * 2 + 16..] {
            assert!((x - 0.5).abs() < 1e-3, "DC drift: {x}");
        }
    }

    #[test]
    fn output_stays_bounded() {
        let mut s = PitchShifter::new(8_000, PitchParam::new(-9.0));
        let input: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 0.3).sin() * 0.9)
            .collect();
        let out = s.process(&input);
        assert!(out.iter().all(|&x| x.is_finite() && x.abs() <= 1.0 + 1e-3));
    }

    #[test]
    fn retune_mid_stream_does_not_break_continuity() {
        let param = PitchParam::new(0.0);
        let mut s = PitchShifter::new(8_000, param.clone());

        let _ = s.process(&vec![0.2_f32; 4_000]);
        param.set(6.0);
        let out = s.process(&vec![0.2_f32; 4_000]);

        assert_eq!(out.len(), 4_000);
        assert!(out.iter().all(|&x| x.is_finite()));
    }

    #[test]
    fn reset_clears_the_delay_line() {
        let mut s = PitchShifter::new(8_000, PitchParam::new(3.0));
        let _ = s.process(&vec![0.9_f32; 2_000]);
        s.reset();
        let out = s.process(&vec![0.0_f32; 2_000]);
        assert!(out.iter().all(|&x| x == 0.0));
    }
}
