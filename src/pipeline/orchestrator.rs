//! Kiosk loop that runs from startup until shutdown.

use crate::compose::{Compliment, ComplimentComposer};
use crate::config::Config;
use crate::consent::{ConsentDecision, ConsentGate};
use crate::pipeline::error::{ErrorReporter, LogReporter, StageError};
use crate::speech::SpeechIo;
use crate::vision::SceneDescriber;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Spoken after consent is refused or never given.
pub const PERMISSION_REMINDER: &str =
    "I need your permission to take a quick look before I can give you a personal compliment.";

/// Settings the loop itself needs.
#[derive(Debug, Clone, PartialEq)]
pub struct KioskConfig {
    pub trigger_phrase: String,
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
}

impl From<&Config> for KioskConfig {
    fn from(config: &Config) -> Self {
        Self {
            trigger_phrase: config.trigger.phrase.clone(),
            listen_timeout: config.listen.timeout(),
            phrase_limit: config.listen.phrase_limit(),
        }
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Where the kiosk is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    AwaitingTrigger,
    AwaitingConsent,
    Capturing,
    Composing,
    Speaking,
    Stopped,
}

/// How one cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A compliment was spoken.
    Complimented(Compliment),
    /// Nothing resembling the trigger phrase was heard.
    NoTrigger,
    ConsentDenied,
    NoConsentResponse,
    /// Something went wrong and the kiosk carried on.
    Recovered(StageError),
}

/// Totals for a finished `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub compliments: u64,
}

pub struct Kiosk {
    config: KioskConfig,
    speech: SpeechIo,
    consent: ConsentGate,
    describer: SceneDescriber,
    composer: ComplimentComposer,
    reporter: Box<dyn ErrorReporter>,
    state: CycleState,
}

impl Kiosk {
    pub fn new(
        config: KioskConfig,
        speech: SpeechIo,
        consent: ConsentGate,
        describer: SceneDescriber,
        composer: ComplimentComposer,
    ) -> Self {
        Self {
            config,
            speech,
            consent,
            describer,
            composer,
            reporter: Box::new(LogReporter),
            state: CycleState::Idle,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run one trigger-to-compliment cycle.
    ///
    /// Never panics and never fails: panics inside the cycle are caught and
    /// returned as [`CycleOutcome::Recovered`].
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.state == CycleState::Stopped {
            return CycleOutcome::Recovered(StageError::new(
                CycleState::Stopped,
                "kiosk has been shut down",
            ));
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.cycle())) {
            Ok(outcome) => outcome,
            Err(payload) => CycleOutcome::Recovered(StageError::new(
                self.state,
                format!("panic: {}", panic_message(payload.as_ref())),
            )),
        };

        if let CycleOutcome::Recovered(error) = &outcome {
            self.reporter.report(error);
        }
        self.state = CycleState::Idle;
        outcome
    }

    fn cycle(&mut self) -> CycleOutcome {
        self.state = CycleState::AwaitingTrigger;
        tracing::debug!("listening for '{}'", self.config.trigger_phrase);
        let triggered = self.speech.listen_for_trigger(
            &self.config.trigger_phrase,
            self.config.listen_timeout,
            self.config.phrase_limit,
        );
        if !triggered {
            return CycleOutcome::NoTrigger;
        }
        tracing::info!("trigger phrase detected");

        self.state = CycleState::AwaitingConsent;
        match self.consent.decide(&mut self.speech) {
            ConsentDecision::Granted => {}
            ConsentDecision::Denied => {
                self.speech.speak(PERMISSION_REMINDER);
                return CycleOutcome::ConsentDenied;
            }
            ConsentDecision::NoResponse => {
                self.speech.speak(PERMISSION_REMINDER);
                return CycleOutcome::NoConsentResponse;
            }
        }

        self.state = CycleState::Capturing;
        let observation = self.describer.capture_and_analyze();
        if let Some(error) = observation.error() {
            self.reporter
                .report(&StageError::new(CycleState::Capturing, error));
        }

        self.state = CycleState::Composing;
        let compliment = self.composer.generate_compliment(&observation);
        tracing::debug!(source = ?compliment.source, "compliment composed");

        self.state = CycleState::Speaking;
        match self.speech.try_speak(&compliment.text) {
            Ok(()) => CycleOutcome::Complimented(compliment),
            Err(e) => CycleOutcome::Recovered(StageError::new(CycleState::Speaking, e.to_string())),
        }
    }

    /// Run cycles until `stop` is set, then shut down.
    ///
    /// The flag is checked between cycles, so a cycle in progress always
    /// finishes.
    pub fn run(&mut self, stop: &AtomicBool) -> RunSummary {
        let mut summary = RunSummary::default();
        tracing::info!("kiosk ready, say '{}'", self.config.trigger_phrase);

        while !stop.load(Ordering::SeqCst) && self.state != CycleState::Stopped {
            let outcome = self.run_cycle();
            summary.cycles += 1;
            match &outcome {
                CycleOutcome::Complimented(_) => summary.compliments += 1,
                CycleOutcome::NoTrigger => {}
                other => tracing::info!(outcome = ?other, "cycle finished"),
            }
        }

        self.shutdown();
        tracing::info!(
            cycles = summary.cycles,
            compliments = summary.compliments,
            "kiosk stopped"
        );
        summary
    }

    /// Release the camera and stop accepting cycles. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state != CycleState::Stopped {
            self.describer.shutdown();
            self.state = CycleState::Stopped;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Provenance;
    use crate::error::Result;
    use crate::pipeline::error::MemoryReporter;
    use crate::speech::{MockRecognizer, MockSpeaker, Recognition, Recognizer, TriggerMatcher};
    use crate::vision::{
        Camera, Frame, HeuristicDescriber, MockCamera, MockFaceDetector, Region, Rgb,
    };

    struct PanickingRecognizer;

    impl Recognizer for PanickingRecognizer {
        fn recognize(&mut self, _: Duration, _: Duration) -> Result<Recognition> {
            panic!("microphone driver exploded");
        }
    }

    fn describer(camera: &MockCamera) -> SceneDescriber {
        SceneDescriber::Heuristic(HeuristicDescriber::new(
            Camera::new(Box::new(camera.clone()), 0),
            Box::new(MockFaceDetector::new().with_face(Region::new(0, 0, 2, 2))),
            1,
        ))
    }

    fn kiosk(
        recognizer: Box<dyn Recognizer>,
        speaker: &MockSpeaker,
        camera: &MockCamera,
    ) -> Kiosk {
        let speech = SpeechIo::new(recognizer, Box::new(speaker.clone()), TriggerMatcher::default());
        Kiosk::new(
            KioskConfig::default(),
            speech,
            ConsentGate::new(Duration::from_secs(5), Duration::from_secs(5)),
            describer(camera),
            ComplimentComposer::with_seed(None, 42),
        )
    }

    fn camera() -> MockCamera {
        MockCamera::new(Frame::solid(4, 4, Rgb::new(210, 40, 40)))
    }

    #[test]
    fn test_full_cycle_speaks_template_compliment() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let recognizer = MockRecognizer::new()
            .with_heard("skyy compliment me")
            .with_heard("yes");
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera);

        let outcome = kiosk.run_cycle();

        let CycleOutcome::Complimented(compliment) = outcome else {
            panic!("Expected compliment, got {:?}", outcome);
        };
        assert_eq!(compliment.source, Provenance::Template);
        assert_eq!(speaker.spoken().last(), Some(&compliment.text));
        assert_eq!(camera.opens(), 1);
        assert_eq!(kiosk.state(), CycleState::Idle);
    }

    #[test]
    fn test_no_trigger_does_not_speak() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let mut kiosk = kiosk(
            Box::new(MockRecognizer::new().with_heard("what's the weather")),
            &speaker,
            &camera,
        );

        assert_eq!(kiosk.run_cycle(), CycleOutcome::NoTrigger);
        assert!(speaker.spoken().is_empty());
    }

    #[test]
    fn test_denied_consent_never_touches_camera() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let recognizer = MockRecognizer::new()
            .with_heard("Skyy, compliment me")
            .with_heard("nah");
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera);

        assert_eq!(kiosk.run_cycle(), CycleOutcome::ConsentDenied);
        assert_eq!(camera.opens(), 0);
        assert_eq!(camera.reads(), 0);
        assert_eq!(speaker.spoken().last().map(String::as_str), Some(PERMISSION_REMINDER));
    }

    #[test]
    fn test_silent_consent_is_no_response() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let recognizer = MockRecognizer::new()
            .with_heard("Skyy, compliment me")
            .with_timeout();
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera);

        assert_eq!(kiosk.run_cycle(), CycleOutcome::NoConsentResponse);
        assert_eq!(camera.opens(), 0);
    }

    #[test]
    fn test_camera_failure_still_compliments_and_reports() {
        let speaker = MockSpeaker::new();
        let camera = camera().with_open_failure();
        let reporter = MemoryReporter::new();
        let recognizer = MockRecognizer::new()
            .with_heard("Skyy, compliment me")
            .with_heard("okay");
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera)
            .with_reporter(Box::new(reporter.clone()));

        let outcome = kiosk.run_cycle();

        match outcome {
            CycleOutcome::Complimented(compliment) => {
                assert_eq!(compliment.source, Provenance::Generic)
            }
            other => panic!("Expected generic compliment, got {:?}", other),
        }
        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, CycleState::Capturing);
    }

    #[test]
    fn test_speaker_failure_is_recovered() {
        let speaker = MockSpeaker::new().with_failure();
        let camera = camera();
        let recognizer = MockRecognizer::new()
            .with_heard("Skyy, compliment me")
            .with_heard("sure");
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera);

        match kiosk.run_cycle() {
            CycleOutcome::Recovered(error) => assert_eq!(error.stage, CycleState::Speaking),
            other => panic!("Expected Recovered, got {:?}", other),
        }
    }

    #[test]
    fn test_panic_in_cycle_is_caught() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let reporter = MemoryReporter::new();
        let mut kiosk = kiosk(Box::new(PanickingRecognizer), &speaker, &camera)
            .with_reporter(Box::new(reporter.clone()));

        match kiosk.run_cycle() {
            CycleOutcome::Recovered(error) => {
                assert_eq!(error.stage, CycleState::AwaitingTrigger);
                assert!(error.message.contains("microphone driver exploded"));
            }
            other => panic!("Expected Recovered, got {:?}", other),
        }
        assert_eq!(reporter.errors().len(), 1);
        assert_eq!(kiosk.state(), CycleState::Idle);
    }

    #[test]
    fn test_run_exits_immediately_when_already_stopped() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let mut kiosk = kiosk(Box::new(MockRecognizer::new()), &speaker, &camera);
        let stop = AtomicBool::new(true);

        let summary = kiosk.run(&stop);

        assert_eq!(summary, RunSummary::default());
        assert_eq!(kiosk.state(), CycleState::Stopped);
        assert_eq!(camera.releases(), 0);
    }

    #[test]
    fn test_run_after_shutdown_returns_without_cycles() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let mut kiosk = kiosk(Box::new(MockRecognizer::new()), &speaker, &camera);
        kiosk.shutdown();

        let summary = kiosk.run(&AtomicBool::new(false));

        assert_eq!(summary.cycles, 0);
        assert!(speaker.spoken().is_empty());
    }

    #[test]
    fn test_shutdown_releases_camera_and_blocks_cycles() {
        let speaker = MockSpeaker::new();
        let camera = camera();
        let recognizer = MockRecognizer::new()
            .with_heard("Skyy, compliment me")
            .with_heard("yes");
        let mut kiosk = kiosk(Box::new(recognizer), &speaker, &camera);

        kiosk.run_cycle();
        kiosk.shutdown();
        kiosk.shutdown();

        assert_eq!(camera.releases(), 1);
        assert!(matches!(kiosk.run_cycle(), CycleOutcome::Recovered(_)));
        assert_eq!(kiosk.state(), CycleState::Stopped);
    }
}
