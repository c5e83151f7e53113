//! Engine lifecycle: start/stop, validated setters, observable state.
//!
//! All run state (beat counter, measure counter, next trigger time) lives on
//! a single scheduler worker thread. The caller's thread shares only the
//! configuration and the published view, each behind a mutex, so there is
//! exactly one owner for every piece of mutable timing state.

pub mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::click::ClickSink;
use crate::io::output::{AudioError, ClickBackend, ClickHandle};
use crate::timing::params::{
    validate_beats_per_measure, validate_bpm, validate_count_in_measures, validate_play_every_n,
    Params,
};
use self::scheduler::Scheduler;

/// Re-arm delay between lookahead refills. Well under the lookahead window,
/// so the window is topped up before queued clicks run out even when the
/// timer fires late.
pub const TICK_INTERVAL: Duration = Duration::from_millis(25);

/// Why `start()` left the engine idle.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("failed to spawn scheduler thread: {0}")]
    Worker(#[from] std::io::Error),
}

/// Everything a UI needs to render the engine, captured at one instant.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub is_playing: bool,
    pub is_counting_in: bool,
    /// 1-indexed while running; 0 in the idle state.
    pub current_beat: u32,
    /// 1-indexed measure within post-count-in playback.
    pub current_measure: u64,
    pub params: Params,
}

/// Published view state. Reset on every start and stop.
struct ViewState {
    playing: bool,
    counting_in: bool,
    beat: u32,
    measure: u64,
}

impl ViewState {
    fn idle() -> Self {
        Self {
            playing: false,
            counting_in: false,
            beat: 0,
            measure: 1,
        }
    }
}

/// State shared between the caller's thread and the scheduler worker.
struct Shared {
    params: Mutex<Params>,
    view: Mutex<ViewState>,
    running: AtomicBool,
}

/// The practice metronome engine.
///
/// Owns the audio backend (opened lazily on the first successful `start`,
/// torn down on drop, kept across stops) and the scheduler worker. All
/// entry points are cheap; the lookahead loop runs off-thread.
pub struct Metronome {
    shared: Arc<Shared>,
    backend: Option<ClickBackend>,
    /// The click sink, parked here while idle and lent to the worker while
    /// running.
    sink: Option<ClickHandle>,
    worker: Option<JoinHandle<ClickHandle>>,
}

impl Metronome {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                params: Mutex::new(Params::default()),
                view: Mutex::new(ViewState::idle()),
                running: AtomicBool::new(false),
            }),
            backend: None,
            sink: None,
            worker: None,
        }
    }

    /// Idle → Running. A no-op while already running.
    ///
    /// Opens the audio backend on first use; if that fails the error is
    /// returned and the engine stays idle, ready for a retry.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }

        if self.backend.is_none() {
            let (backend, handle) = ClickBackend::open()?;
            self.backend = Some(backend);
            self.sink = Some(handle);
        }
        let Some(mut sink) = self.sink.take() else {
            // Sink still lent out: a worker from a previous run has not
            // been joined yet. Treat as already running.
            return Ok(());
        };

        let params = *self.shared.params.lock().unwrap();
        {
            let mut view = self.shared.view.lock().unwrap();
            view.playing = true;
            view.counting_in = params.count_in_measures > 0;
            view.beat = 1;
            view.measure = 1;
        }
        self.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("click-scheduler".into())
            .spawn(move || {
                let mut scheduler = Scheduler::start(sink.now(), params);
                while shared.running.load(Ordering::Acquire) {
                    scheduler.tick(
                        || *shared.params.lock().unwrap(),
                        &mut sink,
                        |beat| {
                            let mut view = shared.view.lock().unwrap();
                            view.counting_in = beat.counting_in;
                            view.beat = beat.beat;
                            view.measure = beat.measure;
                        },
                    );
                    thread::sleep(TICK_INTERVAL);
                }
                sink
            });

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                // The sink was consumed by the failed spawn; reopen the
                // backend on the next start.
                self.backend = None;
                self.shared.running.store(false, Ordering::Release);
                *self.shared.view.lock().unwrap() = ViewState::idle();
                Err(err.into())
            }
        }
    }

    /// Any running state → Idle. Idempotent.
    ///
    /// Cancels the pending re-arm; clicks already committed inside the
    /// lookahead window may still sound (a bounded ~100ms tail). The audio
    /// backend stays open for the next run.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(sink) => self.sink = Some(sink),
                Err(_) => log::error!("click scheduler thread panicked"),
            }
        }
        *self.shared.view.lock().unwrap() = ViewState::idle();
    }

    pub fn is_playing(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Tempo in beats per minute. Out-of-range or non-finite input is
    /// ignored and the previous value kept; same for the other setters.
    pub fn set_bpm(&self, value: f64) {
        if let Some(bpm) = validate_bpm(value) {
            self.shared.params.lock().unwrap().bpm = bpm;
        }
    }

    pub fn set_beats_per_measure(&self, value: f64) {
        if let Some(beats) = validate_beats_per_measure(value) {
            self.shared.params.lock().unwrap().beats_per_measure = beats;
        }
    }

    pub fn set_play_every_n(&self, value: f64) {
        if let Some(n) = validate_play_every_n(value) {
            self.shared.params.lock().unwrap().play_every_n = n;
        }
    }

    pub fn set_count_in_measures(&self, value: f64) {
        if let Some(measures) = validate_count_in_measures(value) {
            self.shared.params.lock().unwrap().count_in_measures = measures;
        }
    }

    pub fn params(&self) -> Params {
        *self.shared.params.lock().unwrap()
    }

    /// Current observable state. Reflects the most recently *scheduled*
    /// beat, which may lead the audible one by up to the lookahead window.
    pub fn snapshot(&self) -> Snapshot {
        let params = *self.shared.params.lock().unwrap();
        let view = self.shared.view.lock().unwrap();
        Snapshot {
            is_playing: view.playing,
            is_counting_in: view.counting_in,
            current_beat: view.beat,
            current_measure: view.measure,
            params,
        }
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run without an audio device: setters, snapshots, and idle
    // lifecycle never touch the backend.

    #[test]
    fn setters_validate_and_retain_previous_value() {
        let engine = Metronome::new();
        engine.set_bpm(180.0);
        assert_eq!(engine.params().bpm, 180);

        engine.set_bpm(300.0);
        engine.set_bpm(f64::NAN);
        engine.set_bpm(12.0);
        assert_eq!(engine.params().bpm, 180);

        engine.set_beats_per_measure(3.9);
        assert_eq!(engine.params().beats_per_measure, 3);
        engine.set_beats_per_measure(0.0);
        assert_eq!(engine.params().beats_per_measure, 3);

        engine.set_play_every_n(4.0);
        engine.set_play_every_n(33.0);
        assert_eq!(engine.params().play_every_n, 4);

        engine.set_count_in_measures(2.0);
        engine.set_count_in_measures(-1.0);
        assert_eq!(engine.params().count_in_measures, 2);
    }

    #[test]
    fn idle_snapshot_has_reset_counters() {
        let engine = Metronome::new();
        let snap = engine.snapshot();
        assert!(!snap.is_playing);
        assert!(!snap.is_counting_in);
        assert_eq!(snap.current_beat, 0);
        assert_eq!(snap.current_measure, 1);
        assert_eq!(snap.params, Params::default());
    }

    #[test]
    fn stop_while_idle_is_idempotent() {
        let mut engine = Metronome::new();
        engine.stop();
        let first = engine.snapshot();
        engine.stop();
        assert_eq!(engine.snapshot(), first);
        assert!(!engine.is_playing());
    }

    #[test]
    fn configuration_survives_stop() {
        let mut engine = Metronome::new();
        engine.set_bpm(96.0);
        engine.stop();
        assert_eq!(engine.params().bpm, 96);
    }
}
