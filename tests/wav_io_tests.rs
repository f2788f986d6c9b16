//! WAV input collaborator tests: decode, downmix, end-to-end file runs

use pitch2midi::{audio, Options, Transcriber};
use std::f32::consts::PI;

fn write_wav(
    path: &std::path::Path,
    channels: u16,
    sample_rate: u32,
    samples: &[f32],
) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

fn sine(freq: f32, amplitude: f32, n: usize, sample_rate: u32) -> Vec<f32> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[test]
fn test_mono_wav_round_trip() {
    let dir = std::env::temp_dir();
    let path = dir.join("pitch2midi_mono_test.wav");
    let samples = sine(440.0, 0.8, 44100, 44100);
    write_wav(&path, 1, 44100, &samples);

    let buffer = audio::read_wav_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(buffer.sample_rate, 44100);
    assert_eq!(buffer.len(), 44100);
    // 16-bit quantization noise only
    let max_err = buffer
        .samples
        .iter()
        .zip(&samples)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-3, "max decode error {}", max_err);
}

#[test]
fn test_stereo_wav_is_downmixed() {
    let dir = std::env::temp_dir();
    let path = dir.join("pitch2midi_stereo_test.wav");

    // Identical tone on both channels: downmix equals the mono signal
    let mono = sine(440.0, 0.6, 4096, 44100);
    let mut interleaved = Vec::with_capacity(mono.len() * 2);
    for &sample in &mono {
        interleaved.push(sample);
        interleaved.push(sample);
    }
    write_wav(&path, 2, 44100, &interleaved);

    let buffer = audio::read_wav_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(buffer.len(), mono.len());
    let max_err = buffer
        .samples
        .iter()
        .zip(&mono)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-3);
}

#[test]
fn test_missing_file_is_an_audio_error() {
    let result = audio::read_wav_file("/nonexistent/path/to/audio.wav");
    assert!(matches!(
        result,
        Err(pitch2midi::TranscribeError::AudioFile(_))
    ));
}

#[test]
fn test_file_to_midi_end_to_end() {
    let dir = std::env::temp_dir();
    let wav_path = dir.join("pitch2midi_e2e_test.wav");
    let mid_path = dir.join("pitch2midi_e2e_test.mid");
    write_wav(&wav_path, 1, 44100, &sine(440.0, 0.8, 44100, 44100));

    let buffer = audio::read_wav_file(&wav_path).unwrap();
    let transcriber = Transcriber::new(Options::default()).unwrap();
    let transcription = transcriber.transcribe(&buffer).unwrap();
    assert_eq!(transcription.events.len(), 1);
    assert_eq!(transcription.events[0].pitch, 69);

    transcription.write_midi(&mid_path).unwrap();
    let bytes = std::fs::read(&mid_path).unwrap();
    assert_eq!(&bytes[..4], b"MThd");
    assert_eq!(bytes, transcription.to_midi_bytes().unwrap());

    std::fs::remove_file(&wav_path).ok();
    std::fs::remove_file(&mid_path).ok();
}

#[test]
fn test_noisy_tone_is_still_detected() {
    // Tone 20 dB above a white-noise floor survives transcription
    let sample_rate = 44100;
    let mut samples = sine(440.0, 0.8, sample_rate as usize, sample_rate);
    for sample in &mut samples {
        *sample += (rand::random::<f32>() - 0.5) * 0.02;
    }

    let mut options = Options::default();
    options.cutoff = -10.0;
    let transcriber = Transcriber::new(options).unwrap();
    let buffer = pitch2midi::AudioBuffer::new(samples, sample_rate);

    let transcription = transcriber.transcribe(&buffer).unwrap();
    let pitches: Vec<u8> = transcription.events.iter().map(|e| e.pitch).collect();
    assert!(pitches.contains(&69), "detected {:?}", pitches);
}
