//! cpal-backed click synthesis.
//!
//! [`ClickBackend::open`] builds an output stream on the default device and
//! hands back a [`ClickHandle`], the sending half of the seam: an SPSC ring
//! buffer into the audio callback plus the shared frame clock. The backend
//! half owns the stream and the voice pool; the handle half is `Send` and
//! travels to the scheduler thread.
//!
//! Synthesis is deliberately small: a click is one oscillator (sine or
//! triangle) with an exponential gain decay over 100ms, started at the
//! sample where its timestamp lands. Everything inside the callback is
//! allocation-free.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

use crate::click::{Click, ClickError, ClickSink, ClickTone, ClickTones, ClickWaveform};
use crate::CLICK_SECS;

/// Hard cap on simultaneous click voices; no allocation in the callback.
/// Clicks are 100ms and beats at most 250ms apart, so two voices overlap at
/// worst — the pool leaves generous headroom.
const MAX_VOICES: usize = 8;

/// Gain a click decays down to before the voice is retired.
const GAIN_FLOOR: f32 = 0.01;

const CLICK_QUEUE_SIZE: usize = 64;

/// Why the audio backend could not be opened.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no default output device available")]
    NoOutputDevice,
    #[error("failed to fetch default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// One synthesized click in flight.
#[derive(Clone, Copy)]
struct Voice {
    waveform: ClickWaveform,
    /// Normalized phase, 0.0..1.0.
    phase: f32,
    phase_inc: f32,
    amp: f32,
    decay: f32,
    remaining: u32,
}

impl Voice {
    const SILENT: Voice = Voice {
        waveform: ClickWaveform::Sine,
        phase: 0.0,
        phase_inc: 0.0,
        amp: 0.0,
        decay: 1.0,
        remaining: 0,
    };

    fn start(tone: ClickTone, sample_rate: f32) -> Self {
        let length = (CLICK_SECS * sample_rate).max(1.0);
        Self {
            waveform: tone.waveform,
            phase: 0.0,
            phase_inc: tone.frequency / sample_rate,
            amp: tone.gain,
            decay: (GAIN_FLOOR / tone.gain).powf(1.0 / length),
            remaining: length as u32,
        }
    }

    fn is_active(&self) -> bool {
        self.remaining > 0
    }

    fn next_sample(&mut self) -> f32 {
        let raw = match self.waveform {
            ClickWaveform::Sine => (TAU * self.phase).sin(),
            ClickWaveform::Triangle => {
                let saw = 2.0 * self.phase - 1.0;
                2.0 * saw.abs() - 1.0
            }
        };
        let out = raw * self.amp;

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.amp *= self.decay;
        self.remaining -= 1;

        out
    }
}

/// Callback-side state: due-click dispatch plus the voice pool.
struct ClickMixer {
    sample_rate: f32,
    tones: ClickTones,
    rx: Consumer<Click>,
    voices: [Voice; MAX_VOICES],
}

impl ClickMixer {
    fn new(sample_rate: f32, tones: ClickTones, rx: Consumer<Click>) -> Self {
        Self {
            sample_rate,
            tones,
            rx,
            voices: [Voice::SILENT; MAX_VOICES],
        }
    }

    /// Render one interleaved output buffer starting at `base_frame`.
    fn render(&mut self, data: &mut [f32], channels: usize, base_frame: u64) {
        let frames = data.len() / channels;
        for frame in 0..frames {
            self.start_due_clicks(base_frame + frame as u64);

            let mut sample = 0.0f32;
            for voice in &mut self.voices {
                if voice.is_active() {
                    sample += voice.next_sample();
                }
            }

            // Mono click copied to every channel.
            for ch in 0..channels {
                data[frame * channels + ch] = sample;
            }
        }
    }

    /// Clicks arrive in increasing timestamp order, so peeking the queue
    /// head is enough to find everything due at this frame. A click whose
    /// timestamp already passed (late tick) starts immediately.
    fn start_due_clicks(&mut self, frame: u64) {
        while let Ok(click) = self.rx.peek() {
            if (click.at * f64::from(self.sample_rate)) as u64 > frame {
                break;
            }
            let Ok(click) = self.rx.pop() else { break };
            self.start_voice(click);
        }
    }

    fn start_voice(&mut self, click: Click) {
        let tone = self.tones.tone_for(click.kind);
        let slot = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .unwrap_or(0);
        self.voices[slot] = Voice::start(tone, self.sample_rate);
    }
}

/// Sending half of the backend: implements [`ClickSink`] for the scheduler.
pub struct ClickHandle {
    tx: Producer<Click>,
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl ClickSink for ClickHandle {
    /// The render clock: frames handed to the device so far, in seconds.
    /// Monotonic, immune to wall-clock jitter.
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate
    }

    fn schedule(&mut self, click: Click) -> Result<(), ClickError> {
        self.tx.push(click).map_err(|_| ClickError::QueueFull)
    }
}

/// Owns the cpal stream. Dropping it tears the stream down; the engine
/// keeps it alive across stop/start cycles.
pub struct ClickBackend {
    _stream: cpal::Stream,
    sample_rate: f32,
}

impl ClickBackend {
    /// Open the default output device with the default pitch table.
    pub fn open() -> Result<(Self, ClickHandle), AudioError> {
        Self::open_with(ClickTones::default())
    }

    /// Open the default output device with a custom pitch table.
    pub fn open_with(tones: ClickTones) -> Result<(Self, ClickHandle), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let (tx, rx) = RingBuffer::<Click>::new(CLICK_QUEUE_SIZE);
        let frames = Arc::new(AtomicU64::new(0));
        let frames_cb = Arc::clone(&frames);
        let mut mixer = ClickMixer::new(sample_rate, tones, rx);

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                let frame_count = (data.len() / channels) as u64;
                let base_frame = frames_cb.load(Ordering::Acquire);
                mixer.render(data, channels, base_frame);
                frames_cb.store(base_frame + frame_count, Ordering::Release);
            },
            |err| log::error!("audio stream error: {err}"),
            None,
        )?;
        stream.play()?;

        let handle = ClickHandle {
            tx,
            frames,
            sample_rate: f64::from(sample_rate),
        };
        Ok((
            Self {
                _stream: stream,
                sample_rate,
            },
            handle,
        ))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::click::ClickKind;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn mixer_pair() -> (Producer<Click>, ClickMixer) {
        let (tx, rx) = RingBuffer::<Click>::new(CLICK_QUEUE_SIZE);
        (tx, ClickMixer::new(SAMPLE_RATE, ClickTones::default(), rx))
    }

    #[test]
    fn silent_without_scheduled_clicks() {
        let (_tx, mut mixer) = mixer_pair();
        let mut data = vec![1.0f32; 512];
        mixer.render(&mut data, 1, 0);
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn click_starts_at_its_scheduled_frame() {
        let (mut tx, mut mixer) = mixer_pair();
        // 100 frames into the buffer.
        tx.push(Click {
            at: 100.0 / f64::from(SAMPLE_RATE),
            kind: ClickKind::Beat { accent: true },
        })
        .unwrap();

        let mut data = vec![0.0f32; 512];
        mixer.render(&mut data, 1, 0);

        // Allow one frame of slack for the seconds-to-frame conversion.
        assert!(data[..99].iter().all(|&s| s == 0.0));
        let peak = data[99..].iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!(peak > 0.05, "click should be audible, peak {peak}");
    }

    #[test]
    fn late_click_sounds_immediately() {
        let (mut tx, mut mixer) = mixer_pair();
        tx.push(Click {
            at: 0.0,
            kind: ClickKind::Beat { accent: false },
        })
        .unwrap();

        // Buffer starts well past the timestamp.
        let mut data = vec![0.0f32; 256];
        mixer.render(&mut data, 1, 10_000);
        let peak = data.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!(peak > 0.05);
    }

    #[test]
    fn click_decays_to_silence() {
        let (mut tx, mut mixer) = mixer_pair();
        tx.push(Click {
            at: 0.0,
            kind: ClickKind::CountIn { accent: true },
        })
        .unwrap();

        let click_frames = (CLICK_SECS * SAMPLE_RATE) as usize;
        let mut data = vec![0.0f32; click_frames + 512];
        mixer.render(&mut data, 1, 0);

        let tail = &data[click_frames..];
        assert!(tail.iter().all(|&s| s == 0.0), "voice must retire");
    }

    #[test]
    fn output_copied_to_all_channels() {
        let (mut tx, mut mixer) = mixer_pair();
        tx.push(Click {
            at: 0.0,
            kind: ClickKind::Beat { accent: true },
        })
        .unwrap();

        let channels = 2;
        let mut data = vec![0.0f32; 256 * channels];
        mixer.render(&mut data, channels, 0);
        for frame in data.chunks_exact(channels) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn pool_steals_a_slot_when_full() {
        let (mut tx, mut mixer) = mixer_pair();
        for _ in 0..MAX_VOICES + 2 {
            tx.push(Click {
                at: 0.0,
                kind: ClickKind::Beat { accent: false },
            })
            .unwrap();
        }

        let mut data = vec![0.0f32; 64];
        mixer.render(&mut data, 1, 0);
        // All clicks consumed, none left queued, output stays bounded-ish
        // (the pool caps how many can sound at once).
        assert!(mixer.rx.is_empty());
        assert_eq!(
            mixer.voices.iter().filter(|v| v.is_active()).count(),
            MAX_VOICES
        );
    }
}
