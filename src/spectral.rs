//! Framer / STFT engine: windowing and per-frame spectra

use crate::config::{Options, WindowKind};
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// One analysis frame: immutable spectra plus timing
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    pub index: usize,
    /// index * hop_size / sample_rate
    pub time_sec: f32,
    /// Magnitude in dB, full-scale sine ~ 0 dB, length fft_size/2+1
    pub magnitude_db: Vec<f32>,
    /// Phase in (-pi, pi], length fft_size/2+1
    pub phase: Vec<f32>,
}

/// Generate window coefficients
pub fn window_coefficients(kind: WindowKind, size: usize) -> Vec<f32> {
    let denom = (size - 1) as f32;
    match kind {
        WindowKind::Rectangular => vec![1.0; size],
        WindowKind::Hanning => (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
            .collect(),
        WindowKind::Hamming => (0..size)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / denom).cos())
            .collect(),
        WindowKind::Blackman => (0..size)
            .map(|i| {
                let phase = 2.0 * PI * i as f32 / denom;
                0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
            })
            .collect(),
    }
}

/// Stateless frame producer over a borrowed sample slice.
///
/// Frames are pure functions of (buffer, index): the sequence is lazy,
/// restartable, and safe to evaluate in parallel across indices.
pub struct Stft {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Scales |X| so a full-scale sine reads ~1.0
    norm: f32,
    fft_size: usize,
    hop_size: usize,
    sample_rate: u32,
}

impl Stft {
    pub fn new(options: &Options, sample_rate: u32) -> Self {
        let window = window_coefficients(options.window, options.fft_size);
        let window_sum: f32 = window.iter().sum();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(options.fft_size);

        Self {
            fft,
            window,
            norm: 2.0 / window_sum,
            fft_size: options.fft_size,
            hop_size: options.hop_size,
            sample_rate,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of spectrum bins per frame (fft_size/2 + 1)
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Total frames for a buffer: every frame whose start lies inside the
    /// buffer is emitted, the tail zero-padded
    pub fn frame_count(&self, buffer_len: usize) -> usize {
        if buffer_len == 0 {
            0
        } else {
            buffer_len.div_ceil(self.hop_size)
        }
    }

    /// Duration of one hop in seconds
    pub fn hop_time(&self) -> f32 {
        self.hop_size as f32 / self.sample_rate as f32
    }

    /// Center frequency of a spectrum bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.fft_size as f32
    }

    /// Compute frame `index` over `samples`; out-of-range samples are zero
    pub fn frame(&self, samples: &[f32], index: usize) -> AnalysisFrame {
        let start = index * self.hop_size;
        let mut buffer: Vec<Complex32> = (0..self.fft_size)
            .map(|i| {
                let sample = samples.get(start + i).copied().unwrap_or(0.0);
                Complex32::new(sample * self.window[i], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        let bins = self.bin_count();
        let mut magnitude_db = Vec::with_capacity(bins);
        let mut phase = Vec::with_capacity(bins);
        for value in &buffer[..bins] {
            magnitude_db.push(20.0 * (value.norm() * self.norm + 1e-12).log10());
            phase.push(value.im.atan2(value.re));
        }

        AnalysisFrame {
            index,
            time_sec: start as f32 / self.sample_rate as f32,
            magnitude_db,
            phase,
        }
    }
}
