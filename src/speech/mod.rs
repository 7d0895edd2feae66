//! Speech input and output for the kiosk.
//!
//! [`SpeechIo`] pairs a [`Recognizer`] with a [`Speaker`] and applies the
//! trigger matching policy. Nothing here fails past its boundary: recognition
//! problems become "nothing heard" and playback problems are logged.

pub mod matcher;
pub mod recognizer;
pub mod tts;

pub use matcher::TriggerMatcher;
pub use recognizer::{MicrophoneRecognizer, MockRecognizer, Recognition, Recognizer};
pub use tts::{CommandSpeaker, MockSpeaker, Speaker};

use crate::error::Result;
use std::time::Duration;

pub struct SpeechIo {
    recognizer: Box<dyn Recognizer>,
    speaker: Box<dyn Speaker>,
    matcher: TriggerMatcher,
}

impl SpeechIo {
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        speaker: Box<dyn Speaker>,
        matcher: TriggerMatcher,
    ) -> Self {
        Self {
            recognizer,
            speaker,
            matcher,
        }
    }

    /// Listen once and report whether the trigger phrase was spoken.
    pub fn listen_for_trigger(
        &mut self,
        phrase: &str,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> bool {
        match self.listen(timeout, phrase_limit) {
            Some(heard) => {
                let matched = self.matcher.matches(&heard, phrase);
                if !matched {
                    tracing::debug!(heard = %heard, "not the trigger phrase");
                }
                matched
            }
            None => false,
        }
    }

    /// Listen once and return the recognized text.
    ///
    /// `None` on timeout, unintelligible audio or a recognizer failure.
    pub fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Option<String> {
        match self.recognizer.recognize(timeout, phrase_limit) {
            Ok(Recognition::Heard(text)) => {
                tracing::info!("heard: {}", text);
                Some(text)
            }
            Ok(Recognition::Timeout) => {
                tracing::trace!("listen timed out");
                None
            }
            Ok(Recognition::Unintelligible) => {
                tracing::debug!("could not understand audio");
                None
            }
            Err(e) => {
                tracing::warn!("speech recognition failed: {}", e);
                None
            }
        }
    }

    /// Speak `text`, returning playback failures.
    pub fn try_speak(&mut self, text: &str) -> Result<()> {
        self.speaker.speak(text)
    }

    /// Speak `text`; failures are logged and otherwise ignored.
    pub fn speak(&mut self, text: &str) {
        if let Err(e) = self.try_speak(text) {
            tracing::warn!("speech output failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "Skyy, compliment me";

    fn io(recognizer: MockRecognizer, speaker: MockSpeaker) -> SpeechIo {
        SpeechIo::new(
            Box::new(recognizer),
            Box::new(speaker),
            TriggerMatcher::default(),
        )
    }

    fn window() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_listen_for_trigger_matches_loose_transcript() {
        let mut speech = io(
            MockRecognizer::new().with_heard("skyy compliment me"),
            MockSpeaker::new(),
        );
        assert!(speech.listen_for_trigger(PHRASE, window(), window()));
    }

    #[test]
    fn test_listen_for_trigger_false_on_other_speech() {
        let mut speech = io(
            MockRecognizer::new().with_heard("turn on the lights"),
            MockSpeaker::new(),
        );
        assert!(!speech.listen_for_trigger(PHRASE, window(), window()));
    }

    #[test]
    fn test_listen_for_trigger_false_on_timeout_noise_and_failure() {
        let mut speech = io(
            MockRecognizer::new()
                .with_timeout()
                .with_unintelligible()
                .with_failure("model crashed"),
            MockSpeaker::new(),
        );
        for _ in 0..3 {
            assert!(!speech.listen_for_trigger(PHRASE, window(), window()));
        }
    }

    #[test]
    fn test_listen_returns_text() {
        let mut speech = io(MockRecognizer::new().with_heard("yes please"), MockSpeaker::new());
        assert_eq!(speech.listen(window(), window()), Some("yes please".to_string()));
        assert_eq!(speech.listen(window(), window()), None);
    }

    #[test]
    fn test_speak_swallows_failures() {
        let speaker = MockSpeaker::new().with_failure();
        let handle = speaker.clone();
        let mut speech = io(MockRecognizer::new(), speaker);

        speech.speak("hello");
        assert!(speech.try_speak("again").is_err());
        assert_eq!(handle.spoken(), vec!["hello", "again"]);
    }
}
