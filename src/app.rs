//! Composition root: turns a [`Config`] into a running [`Kiosk`].

use crate::backend::{OllamaClient, TextGenerator};
use crate::compose::ComplimentComposer;
use crate::config::{Config, DescriberKind, GeneratorKind};
use crate::error::Result;
use crate::vision::{
    Camera, CommandFaceDetector, FfmpegCamera, GenerativeDescriber, HeuristicDescriber,
    SceneDescriber,
};
use std::time::Duration;

#[cfg(feature = "cpal-audio")]
use crate::{
    audio::capture::CpalAudioSource,
    audio::utterance::{UtteranceConfig, UtteranceRecorder},
    audio::vad::VadConfig,
    consent::ConsentGate,
    pipeline::{Kiosk, KioskConfig, RunSummary},
    speech::{CommandSpeaker, MicrophoneRecognizer, SpeechIo, TriggerMatcher},
    stt::whisper::{WhisperConfig, WhisperTranscriber},
};
#[cfg(feature = "cpal-audio")]
use std::sync::{Arc, atomic::AtomicBool};

fn ollama_client(config: &Config, model: &str) -> Result<OllamaClient> {
    OllamaClient::new(
        &config.ollama.url,
        model,
        Duration::from_secs(config.ollama.timeout_secs),
    )
}

/// Build the configured scene describer around the ffmpeg camera.
///
/// The camera is not opened here; it opens on the first capture.
pub fn build_describer(config: &Config) -> Result<SceneDescriber> {
    let camera = Camera::new(
        Box::new(FfmpegCamera::from_config(&config.camera)),
        config.camera.warmup_frames,
    );

    let describer = match config.vision.describer {
        DescriberKind::Heuristic => SceneDescriber::Heuristic(HeuristicDescriber::new(
            camera,
            Box::new(CommandFaceDetector::from_config(&config.vision)),
            config.vision.color_sample_step,
        )),
        DescriberKind::Generative => SceneDescriber::Generative(GenerativeDescriber::new(
            camera,
            Box::new(ollama_client(config, &config.vision.model)?),
        )),
    };
    Ok(describer)
}

/// Build the compliment composer, with an Ollama generator when configured.
pub fn build_composer(config: &Config) -> Result<ComplimentComposer> {
    let generator: Option<Box<dyn TextGenerator>> = match config.composer.generator {
        GeneratorKind::None => None,
        GeneratorKind::Ollama => Some(Box::new(ollama_client(config, &config.composer.model)?)),
    };
    Ok(ComplimentComposer::new(generator, config.composer.min_length))
}

/// Build the full kiosk from configuration.
///
/// # Errors
/// Fails when the microphone, the Whisper model or the HTTP client cannot
/// be set up. Camera and backend problems surface later, per cycle.
#[cfg(feature = "cpal-audio")]
pub fn build_kiosk(config: &Config) -> Result<Kiosk> {
    let source = CpalAudioSource::new(config.listen.device.as_deref())?;
    let utterance = UtteranceConfig {
        vad: VadConfig {
            speech_threshold: config.listen.vad_threshold,
            silence_duration_ms: config.listen.silence_duration_ms,
        },
        ..UtteranceConfig::default()
    };
    let recorder = UtteranceRecorder::new(Box::new(source), utterance);

    let transcriber = WhisperTranscriber::new(WhisperConfig::from(&config.stt))?;
    tracing::info!("loaded speech model '{}'", config.stt.model);
    let recognizer = MicrophoneRecognizer::new(recorder, Arc::new(transcriber));

    let speech = SpeechIo::new(
        Box::new(recognizer),
        Box::new(CommandSpeaker::from_config(&config.tts)),
        TriggerMatcher::new(
            config.trigger.similarity_threshold,
            config.trigger.word_overlap_tolerance,
        ),
    );

    let describer = build_describer(config)?;
    let composer = build_composer(config)?;
    tracing::info!(
        describer = ?config.vision.describer,
        generator = ?config.composer.generator,
        "scene and compliment backends ready"
    );

    Ok(Kiosk::new(
        KioskConfig::from(config),
        speech,
        ConsentGate::from_config(&config.listen),
        describer,
        composer,
    ))
}

/// Build the kiosk and run it until `stop` is set.
#[cfg(feature = "cpal-audio")]
pub fn run(config: &Config, stop: Arc<AtomicBool>) -> Result<RunSummary> {
    let mut kiosk = build_kiosk(config)?;
    Ok(kiosk.run(&stop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_heuristic_describer() {
        let describer = build_describer(&Config::default()).unwrap();
        assert!(matches!(describer, SceneDescriber::Heuristic(_)));
    }

    #[test]
    fn test_generative_describer_selected_by_config() {
        let mut config = Config::default();
        config.vision.describer = DescriberKind::Generative;

        let describer = build_describer(&config).unwrap();
        assert!(matches!(describer, SceneDescriber::Generative(_)));
    }

    #[test]
    fn test_composer_builds_with_and_without_generator() {
        let mut config = Config::default();
        assert!(build_composer(&config).is_ok());

        config.composer.generator = GeneratorKind::Ollama;
        assert!(build_composer(&config).is_ok());
    }
}
