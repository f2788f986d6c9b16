//! Configuration surface for the transcription engine

use crate::error::{Result, TranscribeError};
use serde::{Deserialize, Serialize};

/// Window function applied before the spectral transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Rectangular,
    #[default]
    Hanning,
    Hamming,
    Blackman,
}

impl WindowKind {
    /// Parse a window name as used in config files and on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rectangular" | "none" => Some(WindowKind::Rectangular),
            "hanning" | "hann" => Some(WindowKind::Hanning),
            "hamming" => Some(WindowKind::Hamming),
            "blackman" => Some(WindowKind::Blackman),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Rectangular => "rectangular",
            WindowKind::Hanning => "hanning",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
        }
    }
}

/// Drum-hit suppression parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrumRemoval {
    /// Onsets closer than this many frames count as simultaneous
    pub window_frames: usize,
    /// Power ratio to the loudest simultaneous onset above which an event is
    /// considered part of the broadband hit
    pub ratio: f32,
}

/// Octave-error removal parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OctaveRemoval {
    /// Power ratio below which the quieter of an overlapping octave pair is dropped
    pub ratio: f32,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Spectral transform length, power of two, >= 64
    pub fft_size: usize,
    /// Frame stride in samples, 1..=fft_size
    pub hop_size: usize,
    pub window: WindowKind,
    /// Activation threshold in dB (0 dB = full-scale sine), must be negative
    pub cutoff: f32,
    /// Lowest MIDI note scanned
    pub note_bottom: u8,
    /// Highest MIDI note scanned
    pub note_top: u8,
    /// Enable cross-frame phase refinement
    pub phase_vocoder: bool,
    /// Semitone offset applied to the note-to-frequency mapping
    pub pitch_adjust: f32,
    pub drum_removal: Option<DrumRemoval>,
    pub octave_removal: Option<OctaveRemoval>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 512,
            window: WindowKind::Hanning,
            cutoff: -5.0,
            note_bottom: 28,
            note_top: 103,
            phase_vocoder: false,
            pitch_adjust: 0.0,
            drum_removal: None,
            octave_removal: None,
        }
    }
}

impl Options {
    /// Number of MIDI notes in the scanned range
    pub fn note_count(&self) -> usize {
        (self.note_top - self.note_bottom) as usize + 1
    }
}

/// Validate configuration parameters; fails fast before any frame work
pub fn validate_options(options: &Options) -> Result<()> {
    if options.fft_size < 64 || !options.fft_size.is_power_of_two() {
        return Err(TranscribeError::Configuration(format!(
            "fft_size must be a power of two >= 64, got {}",
            options.fft_size
        )));
    }

    if options.hop_size == 0 || options.hop_size > options.fft_size {
        return Err(TranscribeError::Configuration(format!(
            "hop_size must be in 1..=fft_size ({}), got {}",
            options.fft_size, options.hop_size
        )));
    }

    if options.note_bottom > options.note_top {
        return Err(TranscribeError::Configuration(format!(
            "note_bottom {} exceeds note_top {}",
            options.note_bottom, options.note_top
        )));
    }

    if options.note_top > 127 {
        return Err(TranscribeError::Configuration(format!(
            "note_top must be a MIDI note number (0-127), got {}",
            options.note_top
        )));
    }

    if !options.cutoff.is_finite() || options.cutoff >= 0.0 {
        return Err(TranscribeError::Configuration(format!(
            "cutoff must be a negative dB value, got {}",
            options.cutoff
        )));
    }

    if !options.pitch_adjust.is_finite() || options.pitch_adjust.abs() > 24.0 {
        return Err(TranscribeError::Configuration(format!(
            "pitch_adjust must be within -24..=24 semitones, got {}",
            options.pitch_adjust
        )));
    }

    if let Some(drum) = &options.drum_removal {
        if drum.window_frames == 0 {
            return Err(TranscribeError::Configuration(
                "drum_removal.window_frames must be >= 1".to_string(),
            ));
        }
        if !drum.ratio.is_finite() || !(0.0..=1.0).contains(&drum.ratio) {
            return Err(TranscribeError::Configuration(format!(
                "drum_removal.ratio must be in 0.0..=1.0, got {}",
                drum.ratio
            )));
        }
    }

    if let Some(octave) = &options.octave_removal {
        if !octave.ratio.is_finite() || !(0.0..=1.0).contains(&octave.ratio) {
            return Err(TranscribeError::Configuration(format!(
                "octave_removal.ratio must be in 0.0..=1.0, got {}",
                octave.ratio
            )));
        }
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_options<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Options> {
    let content = std::fs::read_to_string(path)?;
    let options: Options = serde_json::from_str(&content)?;
    validate_options(&options)?;
    Ok(options)
}

/// Save configuration to JSON file
pub fn save_options<P: AsRef<std::path::Path>>(options: &Options, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(options)?;
    std::fs::write(path, content)?;
    Ok(())
}
