//! Pipeline stages: per-frame spectra to filtered note events

pub mod pitch;
pub mod postprocess;
pub mod tracker;
pub mod vocoder;
