//! Polyphonic Audio-to-MIDI Transcription Engine
//!
//! A deterministic, non-ML signal processing pipeline that extracts a
//! symbolic note stream from raw audio: windowed spectral analysis, pitch
//! detection over a fixed MIDI note grid, optional phase-vocoder frequency
//! refinement, per-note onset/offset tracking, and post-processing before
//! MIDI encoding.

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod session;
pub mod spectral;
pub mod stages;

pub use audio::AudioBuffer;
pub use config::{DrumRemoval, OctaveRemoval, Options, WindowKind};
pub use error::{Result, TranscribeError};
pub use session::{CancelToken, TranscriptionSession};
pub use stages::tracker::NoteEvent;

use crate::midi::{MidiMeta, TimedEvent};
use crate::spectral::{AnalysisFrame, Stft};
use crate::stages::pitch::NoteGrid;
use crate::stages::postprocess;
use crate::stages::tracker::NoteTracker;
use crate::stages::vocoder::PhaseRefiner;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// The result of one transcription call: the filtered note-event list plus
/// the timing metadata needed to interpret and encode it
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub events: Vec<NoteEvent>,
    pub meta: MidiMeta,
    pub frame_count: usize,
    pub sample_rate: u32,
    pub hop_size: usize,
}

impl Transcription {
    /// Seconds corresponding to a frame index
    pub fn frame_time(&self, frame: usize) -> f32 {
        frame as f32 * self.hop_size as f32 / self.sample_rate as f32
    }

    /// The deterministically ordered timed event stream
    pub fn timed_events(&self) -> Result<Vec<TimedEvent>> {
        midi::encode_events(&self.events)
    }

    /// Serialize to standard-MIDI-file bytes
    pub fn to_midi_bytes(&self) -> Result<Vec<u8>> {
        midi::midi_bytes(&self.events, &self.meta)
    }

    /// Write a .mid file
    pub fn write_midi<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        midi::write_midi_file(path, &self.events, &self.meta)
    }
}

/// Main transcription pipeline
pub struct Transcriber {
    options: Options,
}

impl Transcriber {
    /// Create a transcriber; configuration is validated up front and
    /// nothing runs on failure
    pub fn new(options: Options) -> Result<Self> {
        config::validate_options(&options)?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Transcribe a buffer with default session side-channels
    pub fn transcribe(&self, buffer: &AudioBuffer) -> Result<Transcription> {
        self.transcribe_session(buffer, &mut TranscriptionSession::new())
    }

    /// Transcribe a buffer, reporting progress and honoring cancellation
    /// through the given session.
    ///
    /// Frames are analyzed batch-parallel; each batch is drained strictly
    /// in index order through the refiner and the note tracker, then the
    /// progress sink runs and the cancel flag is checked.
    pub fn transcribe_session(
        &self,
        buffer: &AudioBuffer,
        session: &mut TranscriptionSession,
    ) -> Result<Transcription> {
        audio::validate_buffer(buffer)?;

        let options = &self.options;
        let stft = Stft::new(options, buffer.sample_rate);
        let grid = NoteGrid::new(options, buffer.sample_rate);
        let mut refiner = options.phase_vocoder.then(|| {
            PhaseRefiner::new(&grid, options.fft_size, options.hop_size, buffer.sample_rate)
        });
        let mut tracker = NoteTracker::new(options);

        let total = stft.frame_count(buffer.len());
        log::info!(
            "analyzing {} frames, {} notes scanned ({}..={})",
            total,
            options.note_count(),
            options.note_bottom,
            options.note_top
        );

        let batch = session.batch_frames();
        let mut start = 0usize;
        while start < total {
            if session.is_cancelled() {
                return Err(TranscribeError::Cancelled);
            }
            let end = (start + batch).min(total);

            // Spectral analysis is pure per frame; order restored by the
            // indexed collect
            let frames: Vec<AnalysisFrame> = (start..end)
                .into_par_iter()
                .map(|index| stft.frame(&buffer.samples, index))
                .collect();

            for frame in &frames {
                let activations = grid.activations(frame, options.cutoff, refiner.as_mut());
                tracker.process_frame(frame.index, &activations);
            }

            session.report(end as f64 / total as f64);
            if session.is_cancelled() {
                return Err(TranscribeError::Cancelled);
            }
            start = end;
        }

        let mut events = tracker.finish();
        log::info!("tracked {} raw note events", events.len());

        if let Some(drum) = &options.drum_removal {
            postprocess::remove_drum_hits(&mut events, drum);
        }
        if let Some(octave) = &options.octave_removal {
            postprocess::remove_octave_errors(&mut events, octave);
        }

        Ok(Transcription {
            events,
            meta: MidiMeta::derive(buffer.sample_rate, options.hop_size),
            frame_count: total,
            sample_rate: buffer.sample_rate,
            hop_size: options.hop_size,
        })
    }
}
