//! Beat arithmetic: the canonical transform from a monotonically increasing
//! beat counter to (beat-in-measure, measure) pairs, plus the predicates the
//! scheduler evaluates per beat.
//!
//! The same transform serves count-in and normal counting; the two phases
//! differ only in which beat count is fed in (raw from the start of the run
//! vs. re-based past the count-in boundary).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position within the measure grid. Both fields are 1-indexed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatState {
    /// Beat within the measure, `1..=beats_per_measure`.
    pub beat: u32,
    /// Measure number, growing without bound.
    pub measure: u64,
}

/// Map a 0-indexed beat count onto the measure grid.
///
/// Defined for every `beat_count` and `beats_per_measure >= 1`. At
/// `beat_count = k * beats_per_measure` the result is beat 1 of measure
/// `k + 1` — a measure boundary.
pub fn beat_state(beat_count: u64, beats_per_measure: u32) -> BeatState {
    let beats_per_measure = u64::from(beats_per_measure);
    BeatState {
        beat: (beat_count % beats_per_measure) as u32 + 1,
        measure: beat_count / beats_per_measure + 1,
    }
}

/// True when `beat_count` lands on a measure boundary (the accented beat).
pub fn is_first_beat(beat_count: u64, beats_per_measure: u32) -> bool {
    beat_count % u64::from(beats_per_measure) == 0
}

/// Training-mode predicate: does this measure sound?
///
/// With `play_every_n == 1` every measure sounds. Otherwise measures
/// 1, N+1, 2N+1, … sound and the rest are silent.
pub fn is_sounding_measure(measure: u64, play_every_n: u32) -> bool {
    play_every_n == 1 || measure % u64::from(play_every_n) == 1
}

/// True while `beat_count` is still inside the count-in window.
///
/// The boundary beat `count_in_measures * beats_per_measure` itself is the
/// first beat of normal playback: inclusive below, exclusive at and above.
pub fn is_count_in_phase(beat_count: u64, count_in_measures: u32, beats_per_measure: u32) -> bool {
    count_in_measures > 0 && beat_count < u64::from(count_in_measures * beats_per_measure)
}

/// Beat state within the count-in, driven by the raw beat count from the
/// start of the run. Same arithmetic as [`beat_state`].
pub fn count_in_beat_state(beat_count: u64, beats_per_measure: u32) -> BeatState {
    beat_state(beat_count, beats_per_measure)
}

/// Interval between beats in seconds: `60 / bpm`.
pub fn seconds_per_beat(bpm: u32) -> f64 {
    60.0 / f64::from(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_cycles_within_measure() {
        // 4/4: beats run 1..=4 then repeat, measure advances each cycle.
        for beat_count in 0..12 {
            let state = beat_state(beat_count, 4);
            assert_eq!(state.beat, (beat_count % 4) as u32 + 1);
            assert_eq!(state.measure, beat_count / 4 + 1);
        }
    }

    #[test]
    fn measure_boundary_is_beat_one() {
        for k in 0..5 {
            let state = beat_state(k * 7, 7);
            assert_eq!(state.beat, 1);
            assert_eq!(state.measure, k + 1);
            assert!(is_first_beat(k * 7, 7));
        }
        assert!(!is_first_beat(1, 7));
        assert!(!is_first_beat(6, 7));
    }

    #[test]
    fn single_beat_measures() {
        let state = beat_state(9, 1);
        assert_eq!(state.beat, 1);
        assert_eq!(state.measure, 10);
    }

    #[test]
    fn play_every_one_always_sounds() {
        for measure in 1..50 {
            assert!(is_sounding_measure(measure, 1));
        }
    }

    #[test]
    fn play_every_four_pattern() {
        assert!(is_sounding_measure(1, 4));
        assert!(!is_sounding_measure(2, 4));
        assert!(!is_sounding_measure(3, 4));
        assert!(!is_sounding_measure(4, 4));
        assert!(is_sounding_measure(5, 4));
        assert!(!is_sounding_measure(8, 4));
        assert!(is_sounding_measure(9, 4));
    }

    #[test]
    fn count_in_phase_boundary_is_exclusive() {
        // 2 count-in measures of 3 beats: beats 0..=5 count in, 6 onward play.
        for beat_count in 0..6 {
            assert!(is_count_in_phase(beat_count, 2, 3));
        }
        assert!(!is_count_in_phase(6, 2, 3));
        assert!(!is_count_in_phase(7, 2, 3));
    }

    #[test]
    fn zero_count_in_never_in_phase() {
        for beat_count in 0..10 {
            assert!(!is_count_in_phase(beat_count, 0, 4));
        }
    }

    #[test]
    fn count_in_state_uses_raw_count() {
        let state = count_in_beat_state(5, 4);
        assert_eq!(state.beat, 2);
        assert_eq!(state.measure, 2);
    }

    #[test]
    fn seconds_per_beat_exact_for_divisors_of_sixty() {
        assert_eq!(seconds_per_beat(60), 1.0);
        assert_eq!(seconds_per_beat(120), 0.5);
        assert_eq!(seconds_per_beat(240), 0.25);
    }

    #[test]
    fn seconds_per_beat_within_tolerance_otherwise() {
        assert!((seconds_per_beat(90) - 0.6667).abs() < 1e-4);
        assert!((seconds_per_beat(40) - 1.5).abs() < 1e-12);
    }
}
