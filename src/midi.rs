//! MIDI event encoding and standard-MIDI-file export

use crate::error::{Result, TranscribeError};
use crate::stages::tracker::NoteEvent;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Fixed output tempo: 120 BPM
pub const TEMPO_USPQ: u32 = 500_000;

/// One MIDI tick per analysis frame; u28 delta-time ceiling
const MAX_TICK: u32 = (1 << 28) - 1;

/// Resolution and tempo metadata accompanying the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MidiMeta {
    /// Ticks per quarter note
    pub ticks_per_quarter: u16,
    /// Microseconds per quarter note
    pub tempo_uspq: u32,
}

impl MidiMeta {
    /// One tick per frame: a quarter note spans half a second of frames
    /// at the fixed 120 BPM tempo
    pub fn derive(sample_rate: u32, hop_size: usize) -> Self {
        let ticks = (0.5 * sample_rate as f64 / hop_size as f64).round() as u32;
        Self {
            ticks_per_quarter: ticks.clamp(1, 0x7FFF) as u16,
            tempo_uspq: TEMPO_USPQ,
        }
    }
}

/// Event kinds in tie-break order: Note-Off sorts before Note-On at the
/// same tick so re-struck pitches never overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimedEventKind {
    NoteOff,
    NoteOn,
}

/// One timed channel event of the encoder's output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u32,
    pub kind: TimedEventKind,
    pub pitch: u8,
    pub velocity: u8,
}

/// Expand note events into a deterministically ordered timed stream:
/// ascending tick, Note-Off before Note-On on ties, then pitch ascending
pub fn encode_events(events: &[NoteEvent]) -> Result<Vec<TimedEvent>> {
    let mut timed = Vec::with_capacity(events.len() * 2);

    for event in events {
        let onset = frame_to_tick(event.onset)?;
        let offset = frame_to_tick(event.offset)?;
        timed.push(TimedEvent {
            tick: onset,
            kind: TimedEventKind::NoteOn,
            pitch: event.pitch,
            velocity: event.velocity,
        });
        timed.push(TimedEvent {
            tick: offset,
            kind: TimedEventKind::NoteOff,
            pitch: event.pitch,
            velocity: 0,
        });
    }

    timed.sort_by_key(|event| (event.tick, event.kind, event.pitch));
    Ok(timed)
}

fn frame_to_tick(frame: usize) -> Result<u32> {
    u32::try_from(frame)
        .ok()
        .filter(|&tick| tick <= MAX_TICK)
        .ok_or_else(|| {
            TranscribeError::Internal(format!("frame index {} exceeds MIDI tick range", frame))
        })
}

/// Serialize the note events as a single-track SMF
pub fn midi_bytes(events: &[NoteEvent], meta: &MidiMeta) -> Result<Vec<u8>> {
    let timed = encode_events(events)?;

    let mut track = Vec::with_capacity(timed.len() + 2);
    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(meta.tempo_uspq))),
    });

    let mut current_tick = 0u32;
    for event in &timed {
        let delta = event.tick - current_tick;
        current_tick = event.tick;

        let message = match event.kind {
            TimedEventKind::NoteOn => MidiMessage::NoteOn {
                key: u7::from(event.pitch),
                vel: u7::from(event.velocity),
            },
            TimedEventKind::NoteOff => MidiMessage::NoteOff {
                key: u7::from(event.pitch),
                vel: u7::from(0),
            },
        };
        track.push(TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message,
            },
        });
    }

    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(meta.ticks_per_quarter)),
        },
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| TranscribeError::MidiExport(format!("failed to serialize MIDI: {:?}", e)))?;
    Ok(bytes)
}

/// Write the encoded stream to a .mid file
pub fn write_midi_file<P: AsRef<Path>>(
    path: P,
    events: &[NoteEvent],
    meta: &MidiMeta,
) -> Result<()> {
    let bytes = midi_bytes(events, meta)?;
    let mut file = File::create(path.as_ref())
        .map_err(|e| TranscribeError::MidiExport(format!("failed to create file: {}", e)))?;
    file.write_all(&bytes)
        .map_err(|e| TranscribeError::MidiExport(format!("failed to write file: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tracker::scale_velocity;

    fn event(pitch: u8, onset: usize, offset: usize) -> NoteEvent {
        NoteEvent {
            pitch,
            onset,
            offset,
            peak_db: -10.0,
            velocity: scale_velocity(-10.0, -20.0),
        }
    }

    #[test]
    fn test_meta_derivation() {
        let meta = MidiMeta::derive(44100, 512);
        assert_eq!(meta.ticks_per_quarter, 43);
        assert_eq!(meta.tempo_uspq, 500_000);

        // Large hop floors at 1 tick per quarter
        let meta = MidiMeta::derive(8000, 8192);
        assert_eq!(meta.ticks_per_quarter, 1);
    }

    #[test]
    fn test_events_sorted_by_tick() {
        let events = vec![event(72, 40, 60), event(60, 0, 20), event(64, 10, 30)];
        let timed = encode_events(&events).unwrap();
        assert_eq!(timed.len(), 6);
        let ticks: Vec<u32> = timed.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 10, 20, 30, 40, 60]);
    }

    #[test]
    fn test_note_off_precedes_note_on_at_same_tick() {
        // Re-struck pitch: offset of the first equals onset of the second
        let events = vec![event(60, 0, 20), event(60, 20, 40)];
        let timed = encode_events(&events).unwrap();
        assert_eq!(timed[1].tick, 20);
        assert_eq!(timed[1].kind, TimedEventKind::NoteOff);
        assert_eq!(timed[2].tick, 20);
        assert_eq!(timed[2].kind, TimedEventKind::NoteOn);
    }

    #[test]
    fn test_tie_broken_by_pitch_after_kind() {
        let events = vec![event(64, 0, 20), event(60, 0, 20)];
        let timed = encode_events(&events).unwrap();
        assert_eq!(timed[0].pitch, 60);
        assert_eq!(timed[0].kind, TimedEventKind::NoteOn);
        assert_eq!(timed[1].pitch, 64);
    }

    #[test]
    fn test_smf_bytes_are_deterministic() {
        let events = vec![event(60, 0, 20), event(64, 10, 30)];
        let meta = MidiMeta::derive(44100, 512);
        let a = midi_bytes(&events, &meta).unwrap();
        let b = midi_bytes(&events, &meta).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..4], b"MThd");
    }

    #[test]
    fn test_empty_event_list_still_serializes() {
        let meta = MidiMeta::derive(44100, 512);
        let bytes = midi_bytes(&[], &meta).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
    }
}
