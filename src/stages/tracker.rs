//! Note tracking: per-note on/off state machine over frame activations

use crate::config::Options;
use crate::stages::pitch::NoteActivation;
use serde::{Deserialize, Serialize};

/// Consecutive frames at or above cutoff before a note turns on
pub const ONSET_DEBOUNCE_FRAMES: usize = 2;
/// Consecutive frames below cutoff before a note turns off
pub const RELEASE_DEBOUNCE_FRAMES: usize = 2;
/// Events spanning fewer frames than this are dropped (anti-flicker)
pub const MIN_EVENT_FRAMES: usize = 1;

/// A discrete note: onset/offset in frame indices, loudness as dB peak
/// and derived MIDI velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub onset: usize,
    pub offset: usize,
    pub peak_db: f32,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn duration_frames(&self) -> usize {
        self.offset - self.onset
    }
}

/// Map a peak amplitude in cutoff..0 dB onto MIDI velocity 1..127
pub fn scale_velocity(peak_db: f32, cutoff: f32) -> u8 {
    let t = (peak_db - cutoff) / (0.0 - cutoff);
    let velocity = 1.0 + t * 126.0;
    velocity.round().clamp(1.0, 127.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TrackState {
    Off,
    On,
}

struct Channel {
    state: TrackState,
    run_above: usize,
    run_below: usize,
    candidate_onset: usize,
    candidate_offset: usize,
    onset: usize,
    peak_db: f32,
}

impl Channel {
    fn new() -> Self {
        Self {
            state: TrackState::Off,
            run_above: 0,
            run_below: 0,
            candidate_onset: 0,
            candidate_offset: 0,
            onset: 0,
            peak_db: f32::NEG_INFINITY,
        }
    }

    fn rearm(&mut self) {
        self.state = TrackState::Off;
        self.run_above = 0;
        self.run_below = 0;
    }
}

/// Per-note state machines; requires frames in increasing index order
pub struct NoteTracker {
    cutoff: f32,
    note_bottom: u8,
    channels: Vec<Channel>,
    events: Vec<NoteEvent>,
    last_index: Option<usize>,
}

impl NoteTracker {
    pub fn new(options: &Options) -> Self {
        Self {
            cutoff: options.cutoff,
            note_bottom: options.note_bottom,
            channels: (0..options.note_count()).map(|_| Channel::new()).collect(),
            events: Vec::new(),
            last_index: None,
        }
    }

    /// Feed one frame's activation vector; activations must be ordered by
    /// note as produced by the grid
    pub fn process_frame(&mut self, index: usize, activations: &[NoteActivation]) {
        debug_assert_eq!(activations.len(), self.channels.len());
        debug_assert!(self.last_index.map_or(true, |last| index > last));
        self.last_index = Some(index);

        for (i, activation) in activations.iter().enumerate() {
            let above = activation.amplitude_db >= self.cutoff;
            let channel = &mut self.channels[i];
            match channel.state {
                TrackState::Off => {
                    if above {
                        if channel.run_above == 0 {
                            channel.candidate_onset = index;
                            channel.peak_db = activation.amplitude_db;
                        } else {
                            channel.peak_db = channel.peak_db.max(activation.amplitude_db);
                        }
                        channel.run_above += 1;
                        if channel.run_above >= ONSET_DEBOUNCE_FRAMES {
                            channel.state = TrackState::On;
                            channel.onset = channel.candidate_onset;
                            channel.run_below = 0;
                        }
                    } else {
                        channel.run_above = 0;
                    }
                }
                TrackState::On => {
                    if above {
                        channel.peak_db = channel.peak_db.max(activation.amplitude_db);
                        channel.run_below = 0;
                    } else {
                        if channel.run_below == 0 {
                            channel.candidate_offset = index;
                        }
                        channel.run_below += 1;
                        if channel.run_below >= RELEASE_DEBOUNCE_FRAMES {
                            let pitch = self.note_bottom + i as u8;
                            let onset = channel.onset;
                            let offset = channel.candidate_offset;
                            let peak_db = channel.peak_db;
                            channel.rearm();
                            if offset - onset >= MIN_EVENT_FRAMES {
                                self.events.push(NoteEvent {
                                    pitch,
                                    onset,
                                    offset,
                                    peak_db,
                                    velocity: scale_velocity(peak_db, self.cutoff),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    /// Close any notes still on at the final frame and return all events
    /// sorted by onset, then pitch
    pub fn finish(mut self) -> Vec<NoteEvent> {
        if let Some(last) = self.last_index {
            for (i, channel) in self.channels.iter_mut().enumerate() {
                if channel.state == TrackState::On {
                    let pitch = self.note_bottom + i as u8;
                    let onset = channel.onset;
                    let peak_db = channel.peak_db;
                    channel.rearm();
                    if last - onset >= MIN_EVENT_FRAMES {
                        self.events.push(NoteEvent {
                            pitch,
                            onset,
                            offset: last,
                            peak_db,
                            velocity: scale_velocity(peak_db, self.cutoff),
                        });
                    }
                }
            }
        }

        self.events.sort_by_key(|e| (e.onset, e.pitch));
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_note_options() -> Options {
        Options {
            note_bottom: 60,
            note_top: 60,
            cutoff: -20.0,
            ..Options::default()
        }
    }

    fn activation(db: f32) -> Vec<NoteActivation> {
        vec![NoteActivation {
            note: 60,
            amplitude_db: db,
            frequency_hz: if db.is_finite() { Some(261.6) } else { None },
        }]
    }

    const OFF: f32 = f32::NEG_INFINITY;

    fn run_sequence(levels: &[f32]) -> Vec<NoteEvent> {
        let options = single_note_options();
        let mut tracker = NoteTracker::new(&options);
        for (i, &db) in levels.iter().enumerate() {
            tracker.process_frame(i, &activation(db));
        }
        tracker.finish()
    }

    #[test]
    fn test_sustained_note_has_debounced_bounds() {
        // frames: off, on x4, off x3
        let events = run_sequence(&[OFF, -10.0, -10.0, -12.0, -10.0, OFF, OFF, OFF]);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.pitch, 60);
        assert_eq!(event.onset, 1);
        assert_eq!(event.offset, 5);
        assert!((event.peak_db + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_frame_blip_is_ignored() {
        let events = run_sequence(&[OFF, -10.0, OFF, OFF, -10.0, OFF, OFF]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_one_frame_dip_does_not_split_note() {
        let events = run_sequence(&[-10.0, -10.0, -10.0, OFF, -10.0, -10.0, OFF, OFF]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].onset, 0);
        assert_eq!(events[0].offset, 6);
    }

    #[test]
    fn test_note_on_at_end_is_closed_at_last_frame() {
        let events = run_sequence(&[OFF, OFF, -10.0, -10.0, -10.0, -10.0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].onset, 2);
        assert_eq!(events[0].offset, 5);
    }

    #[test]
    fn test_repeated_notes_yield_separate_events() {
        let events = run_sequence(&[
            -10.0, -10.0, OFF, OFF, -8.0, -8.0, -8.0, OFF, OFF,
        ]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].onset, 0);
        assert_eq!(events[0].offset, 2);
        assert_eq!(events[1].onset, 4);
        assert_eq!(events[1].offset, 7);
        assert!(events[1].velocity > events[0].velocity);
    }

    #[test]
    fn test_velocity_scaling() {
        // cutoff..0 dB maps onto 1..127
        assert_eq!(scale_velocity(-20.0, -20.0), 1);
        assert_eq!(scale_velocity(0.0, -20.0), 127);
        assert_eq!(scale_velocity(-10.0, -20.0), 64);
        // Above 0 dB clamps
        assert_eq!(scale_velocity(3.0, -20.0), 127);
    }
}
