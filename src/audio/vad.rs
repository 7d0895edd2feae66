//! Voice Activity Detection (VAD) module.
//!
//! RMS thresholding plus a small state machine that tolerates short pauses
//! inside an utterance.

use crate::defaults;
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Duration of silence before speech is considered ended (milliseconds).
    pub silence_duration_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
        }
    }
}

/// Current state of voice activity detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech detected yet.
    Idle,
    /// Speech is being detected.
    Speaking,
    /// Silence detected, waiting to confirm speech end.
    MaybeSilence,
    /// Speech has ended.
    Stopped,
}

/// Events emitted by the VAD processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    SpeechStart,
    Speech,
    Silence,
    SpeechEnd,
}

/// Voice Activity Detector state machine.
pub struct Vad<C: Clock = SystemClock> {
    config: VadConfig,
    state: VadState,
    silence_start: Option<Instant>,
    clock: C,
}

impl<C: Clock> Vad<C> {
    pub fn with_clock(config: VadConfig, clock: C) -> Self {
        Self {
            config,
            state: VadState::Idle,
            silence_start: None,
            clock,
        }
    }

    /// Classifies one frame of 16-bit PCM samples.
    pub fn process(&mut self, samples: &[i16]) -> VadEvent {
        let is_speech = calculate_rms(samples) > self.config.speech_threshold;
        let now = self.clock.now();

        match self.state {
            VadState::Idle if is_speech => {
                self.state = VadState::Speaking;
                VadEvent::SpeechStart
            }
            VadState::Idle | VadState::Stopped => VadEvent::Silence,
            VadState::Speaking if is_speech => VadEvent::Speech,
            VadState::Speaking => {
                self.state = VadState::MaybeSilence;
                self.silence_start = Some(now);
                VadEvent::Silence
            }
            VadState::MaybeSilence if is_speech => {
                self.state = VadState::Speaking;
                self.silence_start = None;
                VadEvent::Speech
            }
            VadState::MaybeSilence => {
                let silent_for = self
                    .silence_start
                    .map(|start| now.duration_since(start))
                    .unwrap_or_default();
                if silent_for >= Duration::from_millis(self.config.silence_duration_ms as u64) {
                    self.state = VadState::Stopped;
                    self.silence_start = None;
                    VadEvent::SpeechEnd
                } else {
                    VadEvent::Silence
                }
            }
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = VadState::Idle;
        self.silence_start = None;
    }
}

impl Vad<SystemClock> {
    pub fn new(config: VadConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), 0.0 for an empty slice.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Mock clock for tests; `sleep` advances time instead of blocking.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: std::sync::Arc<std::sync::Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            current: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
