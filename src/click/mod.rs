//! Click trigger events and the seam between scheduling and synthesis.
//!
//! The engine only needs the capability "sound a click at time T with
//! parameters P". [`ClickSink`] is that capability; the cpal-backed
//! implementation lives in [`crate::io::output`], and tests substitute a
//! recording sink with a hand-advanced clock.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a scheduled click should sound like.
///
/// Count-in clicks are audibly distinct from normal playback so the
/// preparatory measures cannot be mistaken for the exercise itself.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Normal playback beat. `accent` marks the first beat of a measure.
    Beat { accent: bool },
    /// Preparatory count-in beat, alternate timbre.
    CountIn { accent: bool },
}

impl ClickKind {
    pub fn is_accent(self) -> bool {
        match self {
            ClickKind::Beat { accent } | ClickKind::CountIn { accent } => accent,
        }
    }
}

/// One trigger: an absolute audio-clock timestamp plus what to sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    /// Absolute time on the sink's clock, in seconds.
    pub at: f64,
    pub kind: ClickKind,
}

/// Why a single emission failed. Never fatal to the scheduling loop.
#[derive(Debug, Error)]
pub enum ClickError {
    /// The queue to the audio backend is full; the click is dropped.
    #[error("click queue is full")]
    QueueFull,
}

/// Fire-and-forget click output with its own monotonic clock.
///
/// `schedule` commits a future-timestamped event and returns immediately;
/// clicks arrive in strictly increasing `at` order, one per beat.
pub trait ClickSink: Send {
    /// Current time on this sink's clock, in seconds.
    fn now(&self) -> f64;

    /// Commit a click for synthesis at `click.at`.
    fn schedule(&mut self, click: Click) -> Result<(), ClickError>;
}

/// Waveform of a synthesized click.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickWaveform {
    Sine,
    Triangle,
}

/// Synthesis parameters for one click kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickTone {
    pub waveform: ClickWaveform,
    pub frequency: f32,
    pub gain: f32,
}

/// Pitch table mapping click kinds to tones. Swappable on the backend.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickTones {
    pub beat: ClickTone,
    pub accent: ClickTone,
    pub count_in: ClickTone,
    pub count_in_accent: ClickTone,
}

impl ClickTones {
    pub fn tone_for(&self, kind: ClickKind) -> ClickTone {
        match kind {
            ClickKind::Beat { accent: false } => self.beat,
            ClickKind::Beat { accent: true } => self.accent,
            ClickKind::CountIn { accent: false } => self.count_in,
            ClickKind::CountIn { accent: true } => self.count_in_accent,
        }
    }
}

impl Default for ClickTones {
    /// Higher pitch on the accented first beat, lower on the rest; the
    /// count-in keeps the pitches but switches to the triangle timbre.
    fn default() -> Self {
        const GAIN: f32 = 0.3;
        Self {
            beat: ClickTone {
                waveform: ClickWaveform::Sine,
                frequency: 800.0,
                gain: GAIN,
            },
            accent: ClickTone {
                waveform: ClickWaveform::Sine,
                frequency: 1000.0,
                gain: GAIN,
            },
            count_in: ClickTone {
                waveform: ClickWaveform::Triangle,
                frequency: 800.0,
                gain: GAIN,
            },
            count_in_accent: ClickTone {
                waveform: ClickWaveform::Triangle,
                frequency: 1000.0,
                gain: GAIN,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accent_flag_carries_through() {
        assert!(ClickKind::Beat { accent: true }.is_accent());
        assert!(!ClickKind::Beat { accent: false }.is_accent());
        assert!(ClickKind::CountIn { accent: true }.is_accent());
    }

    #[test]
    fn default_tones_distinguish_count_in_by_timbre() {
        let tones = ClickTones::default();
        assert_eq!(tones.beat.waveform, ClickWaveform::Sine);
        assert_eq!(tones.count_in.waveform, ClickWaveform::Triangle);
        assert_eq!(
            tones.count_in_accent.waveform,
            ClickWaveform::Triangle
        );
        // Accents keep the higher pitch in both phases.
        assert!(tones.accent.frequency > tones.beat.frequency);
        assert!(tones.count_in_accent.frequency > tones.count_in.frequency);
    }
}
