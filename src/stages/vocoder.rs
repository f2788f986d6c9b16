//! Phase-vocoder refinement: cross-frame phase to instantaneous frequency

use crate::spectral::AnalysisFrame;
use crate::stages::pitch::NoteGrid;
use std::f32::consts::PI;

struct NoteState {
    prev_phase: f32,
    prev_amplitude: Option<f32>,
}

/// Per-note phase accumulator, owned exclusively by the sequential
/// refinement stage and advanced strictly in frame order.
///
/// Each note's phase is observed at its expected bin; the wrapped phase
/// increment over one hop yields the instantaneous frequency there, which
/// resolves tones that fall between bin centers (and disambiguates notes
/// sharing a bin at coarse FFT sizes).
pub struct PhaseRefiner {
    bins: Vec<usize>,
    /// Expected phase advance per hop at each note's bin
    expected_increment: Vec<f32>,
    states: Vec<NoteState>,
    /// Refined frequency per note for the current frame
    current: Vec<Option<f32>>,
    bin_hz: f32,
    /// Converts a wrapped phase deviation to Hz
    deviation_hz_per_radian: f32,
    primed: bool,
}

impl PhaseRefiner {
    pub fn new(grid: &NoteGrid, fft_size: usize, hop_size: usize, sample_rate: u32) -> Self {
        let n = grid.len();
        let bins: Vec<usize> = (0..n).map(|idx| grid.expected_bin(idx)).collect();
        let expected_increment = bins
            .iter()
            .map(|&bin| 2.0 * PI * bin as f32 * hop_size as f32 / fft_size as f32)
            .collect();
        let states = (0..n)
            .map(|_| NoteState {
                prev_phase: 0.0,
                prev_amplitude: None,
            })
            .collect();

        Self {
            bins,
            expected_increment,
            states,
            current: vec![None; n],
            bin_hz: sample_rate as f32 / fft_size as f32,
            deviation_hz_per_radian: sample_rate as f32 / (2.0 * PI * hop_size as f32),
            primed: false,
        }
    }

    /// Reset all per-note state; called at session start
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.prev_phase = 0.0;
            state.prev_amplitude = None;
        }
        self.current.fill(None);
        self.primed = false;
    }

    /// Advance phase state with the next frame, in index order
    pub fn begin_frame(&mut self, frame: &AnalysisFrame) {
        for (idx, state) in self.states.iter_mut().enumerate() {
            let bin = self.bins[idx];
            let phase = frame.phase[bin];

            if self.primed {
                let raw = phase - state.prev_phase - self.expected_increment[idx];
                let wrapped = (raw + PI).rem_euclid(2.0 * PI) - PI;
                let freq = bin as f32 * self.bin_hz + wrapped * self.deviation_hz_per_radian;
                self.current[idx] = Some(freq);
            }

            state.prev_phase = phase;
        }
        self.primed = true;
    }

    /// Refined frequency for a note this frame; None on the first frame
    pub fn frequency(&self, idx: usize) -> Option<f32> {
        self.current[idx]
    }

    /// Smooth a note's linear peak amplitude against the previous frame's
    pub fn smooth_amplitude(&mut self, idx: usize, amplitude: f32) -> f32 {
        let state = &mut self.states[idx];
        let smoothed = match state.prev_amplitude {
            Some(prev) => 0.5 * (amplitude + prev),
            None => amplitude,
        };
        state.prev_amplitude = Some(amplitude);
        smoothed
    }
}
