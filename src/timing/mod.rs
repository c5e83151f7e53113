//! Musical timing: pure beat arithmetic and validated parameters.
//!
//! Everything in this module is deterministic and free of timers, audio, and
//! mutable state. The scheduling engine consults these functions every tick.

pub mod beat;
pub mod params;

pub use beat::{
    beat_state, count_in_beat_state, is_count_in_phase, is_first_beat, is_sounding_measure,
    seconds_per_beat, BeatState,
};
pub use params::{
    validate_beats_per_measure, validate_bpm, validate_count_in_measures, validate_play_every_n,
    Params,
};
