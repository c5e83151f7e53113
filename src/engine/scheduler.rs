//! Lookahead click scheduling.
//!
//! Wall-clock timers jitter; the audio clock does not. The scheduler never
//! tries to fire clicks from a timer callback directly. Instead, each tick
//! refills a small horizon ahead of the audio clock: while the next beat's
//! timestamp is inside the window it commits that beat to the sink, advances
//! the timestamp by exactly `seconds_per_beat`, and moves the counters. The
//! tick cadence only has to keep the window topped up; trigger timing rides
//! the audio clock alone.

use crate::click::{Click, ClickKind, ClickSink};
use crate::timing::beat::{
    count_in_beat_state, is_count_in_phase, is_first_beat, is_sounding_measure, seconds_per_beat,
};
use crate::timing::params::Params;
use crate::LOOKAHEAD_SECS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// State published for the most recently scheduled beat.
///
/// This can lead what is currently audible by up to the lookahead window;
/// the lead buys trigger accuracy at the cost of perfectly synchronized
/// visuals.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatView {
    pub counting_in: bool,
    /// 1-indexed beat within the measure (or within the count-in measure).
    pub beat: u32,
    /// 1-indexed measure number; during count-in, the count-in measure.
    pub measure: u64,
}

/// One run's scheduling cursor.
///
/// Created fresh on `start`, discarded on `stop`. `beat_count` is monotonic
/// for the lifetime of the run; `next_trigger` advances by the beat interval
/// and never looks at the wall clock again.
pub struct Scheduler {
    beat_count: u64,
    measure_count: u64,
    next_trigger: f64,
    // Count-in geometry is frozen at start: if the meter changes while
    // counting in, the boundary beat index must not move under the run.
    count_in_measures: u32,
    count_in_meter: u32,
}

impl Scheduler {
    /// Begin a run at `now` on the sink's clock.
    ///
    /// The count-in length and the meter used for count-in beat math are
    /// captured here; live parameter changes reach everything else.
    pub fn start(now: f64, params: Params) -> Self {
        Self {
            beat_count: 0,
            measure_count: 1,
            next_trigger: now,
            count_in_measures: params.count_in_measures,
            count_in_meter: params.beats_per_measure,
        }
    }

    /// Refill the lookahead window.
    ///
    /// `params` is consulted once per scheduled beat, so configuration
    /// changes apply to beats not yet committed and never re-time queued
    /// clicks. `publish` receives the view for every beat scheduled, silent
    /// ones included.
    pub fn tick<S, P, F>(&mut self, mut params: P, sink: &mut S, mut publish: F)
    where
        S: ClickSink + ?Sized,
        P: FnMut() -> Params,
        F: FnMut(BeatView),
    {
        let horizon = sink.now() + LOOKAHEAD_SECS;
        while self.next_trigger < horizon {
            let params = params();
            let view = if self.counting_in() {
                self.schedule_count_in_beat(sink)
            } else {
                self.schedule_playback_beat(&params, sink)
            };
            publish(view);
            self.advance(&params);
        }
    }

    fn counting_in(&self) -> bool {
        is_count_in_phase(self.beat_count, self.count_in_measures, self.count_in_meter)
    }

    fn count_in_beats(&self) -> u64 {
        u64::from(self.count_in_measures * self.count_in_meter)
    }

    fn schedule_count_in_beat<S: ClickSink + ?Sized>(&self, sink: &mut S) -> BeatView {
        let state = count_in_beat_state(self.beat_count, self.count_in_meter);
        self.emit(
            sink,
            Click {
                at: self.next_trigger,
                kind: ClickKind::CountIn {
                    accent: is_first_beat(self.beat_count, self.count_in_meter),
                },
            },
        );
        BeatView {
            counting_in: true,
            beat: state.beat,
            measure: state.measure,
        }
    }

    fn schedule_playback_beat<S: ClickSink + ?Sized>(
        &mut self,
        params: &Params,
        sink: &mut S,
    ) -> BeatView {
        // Re-base past the count-in: measure numbering and the training
        // ratio start over at the first normal beat.
        let playback_beat = self.beat_count - self.count_in_beats();
        if playback_beat == 0 {
            self.measure_count = 1;
        }
        let beat = (playback_beat % u64::from(params.beats_per_measure)) as u32 + 1;
        let accent = is_first_beat(playback_beat, params.beats_per_measure);

        if is_sounding_measure(self.measure_count, params.play_every_n) {
            self.emit(
                sink,
                Click {
                    at: self.next_trigger,
                    kind: ClickKind::Beat { accent },
                },
            );
        }
        BeatView {
            counting_in: false,
            beat,
            measure: self.measure_count,
        }
    }

    fn advance(&mut self, params: &Params) {
        self.next_trigger += seconds_per_beat(params.bpm);
        self.beat_count += 1;

        // Once the new beat sits past the count-in boundary, a landing on a
        // measure boundary rolls the measure counter over.
        let count_in_beats = self.count_in_beats();
        if self.beat_count > count_in_beats {
            let playback_beat = self.beat_count - count_in_beats;
            if playback_beat % u64::from(params.beats_per_measure) == 0 {
                self.measure_count += 1;
            }
        }
    }

    fn emit<S: ClickSink + ?Sized>(&self, sink: &mut S, click: Click) {
        if let Err(err) = sink.schedule(click) {
            log::warn!("dropping click at {:.3}s: {err}", click.at);
        }
    }
}
