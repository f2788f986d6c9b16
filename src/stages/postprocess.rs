//! Note-event post-processing: drum-hit suppression and octave-error removal

use crate::audio::db_to_power;
use crate::config::{DrumRemoval, OctaveRemoval};
use crate::stages::tracker::NoteEvent;

/// A cluster must have more simultaneous onsets than this to look percussive
pub const DRUM_CLUSTER_MIN: usize = 3;

fn overlaps(a: &NoteEvent, b: &NoteEvent) -> bool {
    a.onset <= b.offset && b.onset <= a.offset
}

/// Discard events that are part of a broadband hit: many onsets landing
/// within `window_frames` of each other, each within `ratio` of the
/// cluster's loudest (power terms, strict comparison).
pub fn remove_drum_hits(events: &mut Vec<NoteEvent>, params: &DrumRemoval) {
    let keep: Vec<bool> = events
        .iter()
        .map(|event| {
            let cluster: Vec<&NoteEvent> = events
                .iter()
                .filter(|other| other.onset.abs_diff(event.onset) <= params.window_frames)
                .collect();
            if cluster.len() <= DRUM_CLUSTER_MIN {
                return true;
            }
            let max_power = cluster
                .iter()
                .map(|other| db_to_power(other.peak_db))
                .fold(0.0f32, f32::max);
            db_to_power(event.peak_db) <= params.ratio * max_power
        })
        .collect();

    let before = events.len();
    let mut index = 0;
    events.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    if events.len() != before {
        log::debug!(
            "drum removal discarded {} of {} events",
            before - events.len(),
            before
        );
    }
}

/// Discard the quieter of two temporally overlapping events exactly one
/// octave apart when its power falls below `ratio` of the louder one's.
/// Ties are never removed (the comparison is strict).
pub fn remove_octave_errors(events: &mut Vec<NoteEvent>, params: &OctaveRemoval) {
    let mut keep = vec![true; events.len()];

    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            let a = &events[i];
            let b = &events[j];
            if a.pitch.abs_diff(b.pitch) != 12 || !overlaps(a, b) {
                continue;
            }

            let power_a = db_to_power(a.peak_db);
            let power_b = db_to_power(b.peak_db);
            if power_a == power_b {
                continue;
            }

            let (quiet_idx, quiet_power, loud_power) = if power_a < power_b {
                (i, power_a, power_b)
            } else {
                (j, power_b, power_a)
            };
            if quiet_power < params.ratio * loud_power {
                keep[quiet_idx] = false;
            }
        }
    }

    let before = events.len();
    let mut index = 0;
    events.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    if events.len() != before {
        log::debug!(
            "octave removal discarded {} of {} events",
            before - events.len(),
            before
        );
    }
}
