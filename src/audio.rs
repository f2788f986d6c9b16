//! Audio input collaborator: buffer type, WAV decoding, validation

use crate::error::{Result, TranscribeError};
use hound::WavReader;
use std::path::Path;

/// Mono audio owned by the caller; the engine borrows it read-only
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Samples normalized to [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Validate a buffer before analysis; buffers shorter than fft_size are
/// accepted and analyzed as zero-padded frames
pub fn validate_buffer(buffer: &AudioBuffer) -> Result<()> {
    if buffer.samples.is_empty() {
        return Err(TranscribeError::Input(
            "audio buffer contains no samples".to_string(),
        ));
    }

    if buffer.sample_rate == 0 {
        return Err(TranscribeError::Input(
            "audio buffer has zero sample rate".to_string(),
        ));
    }

    Ok(())
}

/// Load a WAV file into a mono AudioBuffer, averaging stereo channels
pub fn read_wav_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.channels > 2 {
        return Err(TranscribeError::AudioFile(format!(
            "unsupported channel count: {}",
            spec.channels
        )));
    }

    if spec.bits_per_sample > 32 {
        return Err(TranscribeError::AudioFile(format!(
            "unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);

    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                let sample = sample.map_err(TranscribeError::from)? as f32 / max_value;
                samples.push(sample);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                samples.push(sample.map_err(TranscribeError::from)?);
            }
        }
    }

    let samples = if spec.channels == 2 {
        downmix_stereo(&samples)
    } else {
        samples
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Average interleaved stereo to mono
pub fn downmix_stereo(interleaved: &[f32]) -> Vec<f32> {
    interleaved
        .chunks_exact(2)
        .map(|pair| 0.5 * (pair[0] + pair[1]))
        .collect()
}

/// Convert a linear amplitude to decibels; silence floors at a large
/// negative value rather than -inf
pub fn linear_to_db(amplitude: f32) -> f32 {
    20.0 * (amplitude + 1e-12).log10()
}

/// Convert decibels back to a linear amplitude
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert decibels to a linear power ratio
pub fn db_to_power(db: f32) -> f32 {
    10.0f32.powf(db / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_buffer() {
        let buffer = AudioBuffer::new(Vec::new(), 44100);
        assert!(validate_buffer(&buffer).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let buffer = AudioBuffer::new(vec![0.0; 128], 0);
        assert!(validate_buffer(&buffer).is_err());
    }

    #[test]
    fn test_validate_accepts_short_buffer() {
        // Shorter than any fft_size: still analyzed as a zero-padded frame
        let buffer = AudioBuffer::new(vec![0.1; 10], 44100);
        assert!(validate_buffer(&buffer).is_ok());
    }

    #[test]
    fn test_downmix_averages_channels() {
        let interleaved = vec![1.0, 0.0, 0.5, -0.5, -1.0, 1.0];
        let mono = downmix_stereo(&interleaved);
        assert_eq!(mono, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_db_round_trip() {
        for amp in [1.0f32, 0.5, 0.1, 0.01] {
            let db = linear_to_db(amp);
            assert!((db_to_linear(db) - amp).abs() < 1e-4);
        }
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-2);
        // Zero amplitude floors instead of producing -inf
        assert!(linear_to_db(0.0).is_finite());
    }

    #[test]
    fn test_db_to_power_is_squared_amplitude() {
        let amp = db_to_linear(-6.0);
        let power = db_to_power(-6.0);
        assert!((power - amp * amp).abs() < 1e-6);
    }
}
