//! Speech recognition: one recorded utterance in, one transcript out.

use crate::audio::utterance::{Utterance, UtteranceRecorder};
use crate::audio::vad::{Clock, SystemClock};
use crate::error::{KioskError, Result};
use crate::stt::transcriber::Transcriber;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of one recognition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// Recognized text, trimmed and non-empty.
    Heard(String),
    /// Nobody spoke before the listen timeout.
    Timeout,
    /// Audio was captured but produced no words.
    Unintelligible,
}

/// Trait for speech recognizers.
pub trait Recognizer: Send {
    /// Listen for one utterance and transcribe it.
    ///
    /// `timeout` bounds the wait for speech to start, `phrase_limit` the
    /// length of the utterance. Backend failures are errors; silence and
    /// noise are not.
    fn recognize(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Recognition>;
}

/// Microphone recorder feeding a transcriber.
pub struct MicrophoneRecognizer<C: Clock = SystemClock> {
    recorder: UtteranceRecorder<C>,
    transcriber: Arc<dyn Transcriber>,
}

impl<C: Clock> MicrophoneRecognizer<C> {
    pub fn new(recorder: UtteranceRecorder<C>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            recorder,
            transcriber,
        }
    }
}

impl<C: Clock + Clone> Recognizer for MicrophoneRecognizer<C> {
    fn recognize(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Recognition> {
        let samples = match self.recorder.record(timeout, phrase_limit)? {
            Utterance::Speech(samples) => samples,
            Utterance::Timeout => return Ok(Recognition::Timeout),
        };

        let raw = self.transcriber.transcribe(&samples)?;
        let text = strip_markers(&raw);
        tracing::debug!(raw = %raw, text = %text, "transcribed utterance");

        if text.chars().any(char::is_alphanumeric) {
            Ok(Recognition::Heard(text))
        } else {
            Ok(Recognition::Unintelligible)
        }
    }
}

/// Remove Whisper non-speech tags such as `[BLANK_AUDIO]` or `(inaudible)`.
pub fn strip_markers(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut closing: Option<char> = None;
    for c in text.chars() {
        match (closing, c) {
            (None, '[') => closing = Some(']'),
            (None, '(') => closing = Some(')'),
            (None, _) => cleaned.push(c),
            (Some(close), _) if c == close => closing = None,
            (Some(_), _) => {}
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
enum Scripted {
    Result(Recognition),
    Failure(String),
}

/// Mock recognizer for testing.
///
/// Plays back a scripted sequence of outcomes; once exhausted every call
/// times out. Clones share the script and the call counter.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, item: Scripted) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
        self
    }

    /// Next call hears `text`.
    pub fn with_heard(self, text: &str) -> Self {
        self.push(Scripted::Result(Recognition::Heard(text.to_string())))
    }

    /// Next call times out.
    pub fn with_timeout(self) -> Self {
        self.push(Scripted::Result(Recognition::Timeout))
    }

    /// Next call captures audio without words.
    pub fn with_unintelligible(self) -> Self {
        self.push(Scripted::Result(Recognition::Unintelligible))
    }

    /// Next call fails with a transcription error.
    pub fn with_failure(self, message: &str) -> Self {
        self.push(Scripted::Failure(message.to_string()))
    }

    /// Number of `recognize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|calls| *calls).unwrap_or_default()
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Result<Recognition> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        match next {
            Some(Scripted::Result(recognition)) => Ok(recognition),
            Some(Scripted::Failure(message)) => Err(KioskError::Transcription { message }),
            None => Ok(Recognition::Timeout),
        }
    }
}
