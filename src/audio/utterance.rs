//! Records a single spoken utterance from an [`AudioSource`].
//!
//! Waits up to the listen timeout for speech to begin, then keeps recording
//! until the VAD reports the end of speech or the phrase limit elapses.

use crate::audio::recorder::AudioSource;
use crate::audio::vad::{Clock, SystemClock, Vad, VadConfig, VadEvent};
use crate::defaults;
use crate::error::Result;
use std::time::Duration;

/// Length of one VAD frame.
const FRAME_MS: usize = 30;

/// Silence frames kept ahead of the speech onset so soft starts are not clipped.
const PRE_ROLL_FRAMES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct UtteranceConfig {
    pub vad: VadConfig,
    pub sample_rate: u32,
    /// How long to wait between buffer reads.
    pub poll_interval: Duration,
}

impl UtteranceConfig {
    /// Samples in one VAD frame at `sample_rate`.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * FRAME_MS / 1000).max(1)
    }
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            sample_rate: defaults::SAMPLE_RATE,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Result of one listening window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    /// Speech was captured; mono PCM at the configured sample rate.
    Speech(Vec<i16>),
    /// Nobody started speaking before the timeout.
    Timeout,
}

pub struct UtteranceRecorder<C: Clock = SystemClock> {
    source: Box<dyn AudioSource>,
    config: UtteranceConfig,
    clock: C,
}

impl UtteranceRecorder<SystemClock> {
    pub fn new(source: Box<dyn AudioSource>, config: UtteranceConfig) -> Self {
        Self::with_clock(source, config, SystemClock)
    }
}

impl<C: Clock + Clone> UtteranceRecorder<C> {
    pub fn with_clock(source: Box<dyn AudioSource>, config: UtteranceConfig, clock: C) -> Self {
        Self {
            source,
            config,
            clock,
        }
    }

    /// Record one utterance.
    ///
    /// The source is started for the duration of the call and always
    /// stopped again, even when reading fails.
    pub fn record(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Utterance> {
        self.source.start()?;
        let result = self.capture(timeout, phrase_limit);
        if let Err(e) = self.source.stop() {
            tracing::warn!("failed to stop audio source: {e}");
        }
        result
    }

    fn capture(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Utterance> {
        let mut vad = Vad::with_clock(self.config.vad, self.clock.clone());
        // Audio buffered before this call belongs to whatever was said earlier.
        self.source.read_samples()?;

        let started = self.clock.now();
        let mut pre_roll: Vec<i16> = Vec::new();
        let mut speech: Vec<i16> = Vec::new();
        let mut speech_started = None;
        let frame_samples = self.config.frame_samples();

        loop {
            let samples = self.source.read_samples()?;
            for frame in samples.chunks(frame_samples) {
                match vad.process(frame) {
                    VadEvent::SpeechStart => {
                        speech_started = Some(self.clock.now());
                        speech.append(&mut pre_roll);
                        speech.extend_from_slice(frame);
                    }
                    VadEvent::SpeechEnd => {
                        speech.extend_from_slice(frame);
                        tracing::debug!(samples = speech.len(), "utterance ended on silence");
                        return Ok(Utterance::Speech(speech));
                    }
                    VadEvent::Speech | VadEvent::Silence if speech_started.is_some() => {
                        speech.extend_from_slice(frame);
                    }
                    VadEvent::Speech | VadEvent::Silence => {
                        pre_roll.extend_from_slice(frame);
                        let max = PRE_ROLL_FRAMES * frame_samples;
                        if pre_roll.len() > max {
                            pre_roll.drain(..pre_roll.len() - max);
                        }
                    }
                }
            }

            let now = self.clock.now();
            match speech_started {
                Some(onset) if now.duration_since(onset) >= phrase_limit => {
                    tracing::debug!(samples = speech.len(), "utterance hit phrase limit");
                    return Ok(Utterance::Speech(speech));
                }
                None if now.duration_since(started) >= timeout => {
                    return Ok(Utterance::Timeout);
                }
                _ => self.clock.sleep(self.config.poll_interval),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recorder::MockAudioSource;
    use crate::audio::vad::MockClock;
    use crate::error::KioskError;

    /// 30ms at 16kHz.
    const FRAME_SAMPLES: usize = 480;

    fn frames(amplitude: i16, count: usize) -> Vec<i16> {
        vec![amplitude; FRAME_SAMPLES * count]
    }

    fn recorder(source: MockAudioSource, clock: MockClock) -> UtteranceRecorder<MockClock> {
        let config = UtteranceConfig {
            vad: VadConfig {
                speech_threshold: 0.02,
                silence_duration_ms: 100,
            },
            sample_rate: 16000,
            poll_interval: Duration::from_millis(50),
        };
        UtteranceRecorder::with_clock(Box::new(source), config, clock)
    }

    #[test]
    fn test_frame_size_follows_sample_rate() {
        let config = |sample_rate| UtteranceConfig {
            sample_rate,
            ..UtteranceConfig::default()
        };
        assert_eq!(config(16000).frame_samples(), FRAME_SAMPLES);
        assert_eq!(config(8000).frame_samples(), 240);
        assert_eq!(config(48000).frame_samples(), 1440);
        assert_eq!(config(0).frame_samples(), 1);
    }

    #[test]
    fn test_pre_roll_is_measured_in_frames_at_configured_rate() {
        let source = MockAudioSource::new()
            .with_chunk(Vec::new())
            .with_repeated(vec![0; 240], 20)
            .with_chunk(vec![3000; 480])
            .with_repeated(vec![0; 240], 10);
        let config = UtteranceConfig {
            vad: VadConfig {
                speech_threshold: 0.02,
                silence_duration_ms: 100,
            },
            sample_rate: 8000,
            poll_interval: Duration::from_millis(50),
        };
        let mut recorder =
            UtteranceRecorder::with_clock(Box::new(source), config, MockClock::new());

        match recorder
            .record(Duration::from_secs(5), Duration::from_secs(5))
            .unwrap()
        {
            Utterance::Speech(samples) => {
                // Ten 240-sample frames of pre-roll ahead of the onset.
                let onset = samples.iter().position(|&s| s == 3000).unwrap();
                assert_eq!(onset, 2400);
                assert_eq!(samples.iter().filter(|&&s| s == 3000).count(), 480);
            }
            Utterance::Timeout => panic!("Expected speech"),
        }
    }

    #[test]
    fn test_silence_times_out() {
        let source = MockAudioSource::new().with_chunk(frames(0, 1));
        let mut recorder = recorder(source, MockClock::new());

        let utterance = recorder
            .record(Duration::from_secs(1), Duration::from_secs(5))
            .unwrap();

        assert_eq!(utterance, Utterance::Timeout);
    }

    #[test]
    fn test_speech_then_silence_ends_utterance() {
        let source = MockAudioSource::new()
            .with_chunk(frames(0, 1)) // stale buffer, discarded
            .with_chunk(frames(0, 2))
            .with_repeated(frames(3000, 2), 3)
            .with_repeated(frames(0, 2), 4);
        let mut recorder = recorder(source, MockClock::new());

        let utterance = recorder
            .record(Duration::from_secs(5), Duration::from_secs(5))
            .unwrap();

        match utterance {
            Utterance::Speech(samples) => {
                let loud = samples.iter().filter(|&&s| s == 3000).count();
                assert_eq!(loud, FRAME_SAMPLES * 6);
                // Pre-roll silence is kept ahead of the onset.
                assert_eq!(samples[0], 0);
            }
            Utterance::Timeout => panic!("Expected speech"),
        }
    }

    #[test]
    fn test_phrase_limit_cuts_long_speech() {
        let source = MockAudioSource::new()
            .with_chunk(Vec::new())
            .with_repeated(frames(3000, 1), 100);
        let mut recorder = recorder(source, MockClock::new());

        let utterance = recorder
            .record(Duration::from_secs(5), Duration::from_millis(500))
            .unwrap();

        match utterance {
            Utterance::Speech(samples) => {
                // 50ms per poll: onset plus ten polls before the limit trips.
                assert!(samples.len() <= FRAME_SAMPLES * 12, "got {}", samples.len());
                assert!(!samples.is_empty());
            }
            Utterance::Timeout => panic!("Expected speech"),
        }
    }

    #[test]
    fn test_read_failure_propagates_and_stops_source() {
        let source = MockAudioSource::new()
            .with_read_failure()
            .with_error_message("device unplugged");
        let starts = source.start_count();
        let mut recorder = recorder(source, MockClock::new());

        match recorder.record(Duration::from_secs(1), Duration::from_secs(1)) {
            Err(KioskError::AudioCapture { message }) => assert_eq!(message, "device unplugged"),
            other => panic!("Expected AudioCapture error, got {:?}", other),
        }
        assert_eq!(starts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_failure_propagates() {
        let source = MockAudioSource::new().with_start_failure();
        let mut recorder = recorder(source, MockClock::new());

        assert!(
            recorder
                .record(Duration::from_secs(1), Duration::from_secs(1))
                .is_err()
        );
    }
}
