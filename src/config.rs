use crate::defaults;
use crate::error::KioskError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub trigger: TriggerConfig,
    pub listen: ListenConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub camera: CameraConfig,
    pub vision: VisionConfig,
    pub composer: ComposerConfig,
    pub ollama: OllamaConfig,
}

/// Trigger phrase matching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    pub phrase: String,
    pub similarity_threshold: f64,
    pub word_overlap_tolerance: usize,
}

/// Microphone capture and utterance endpointing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenConfig {
    pub device: Option<String>,
    pub timeout_secs: u64,
    pub phrase_limit_secs: u64,
    pub vad_threshold: f32,
    pub silence_duration_ms: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    pub threads: Option<usize>,
}

/// Text-to-speech configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    /// Synthesis command; `None` picks `say` on macOS and `espeak-ng` elsewhere.
    pub command: Option<String>,
    pub voice: Option<String>,
    pub rate: u32,
    pub volume: f32,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub device: String,
    pub warmup_frames: u32,
    pub ffmpeg: String,
}

/// Scene description configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    pub describer: DescriberKind,
    pub model: String,
    pub face_command: String,
    pub smile_command: Option<String>,
    pub color_sample_step: u32,
}

/// Which scene describer to build
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DescriberKind {
    Heuristic,
    Generative,
}

/// Compliment composition configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposerConfig {
    pub generator: GeneratorKind,
    pub model: String,
    pub min_length: usize,
}

/// Which text generator backs the composer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    None,
    Ollama,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            phrase: defaults::TRIGGER_PHRASE.to_string(),
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            word_overlap_tolerance: defaults::WORD_OVERLAP_TOLERANCE,
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            device: None,
            timeout_secs: defaults::LISTEN_TIMEOUT_SECS,
            phrase_limit_secs: defaults::PHRASE_LIMIT_SECS,
            vad_threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
        }
    }
}

impl ListenConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::STT_MODEL_PATH.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: None,
            voice: None,
            rate: defaults::TTS_RATE,
            volume: defaults::TTS_VOLUME,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: defaults::CAMERA_DEVICE.to_string(),
            warmup_frames: defaults::CAMERA_WARMUP_FRAMES,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            describer: DescriberKind::Heuristic,
            model: defaults::VISION_MODEL.to_string(),
            face_command: defaults::FACE_COMMAND.to_string(),
            smile_command: None,
            color_sample_step: defaults::COLOR_SAMPLE_STEP,
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::None,
            model: defaults::TEXT_MODEL.to_string(),
            min_length: defaults::MIN_COMPLIMENT_LEN,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: defaults::OLLAMA_URL.to_string(),
            timeout_secs: defaults::BACKEND_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SKYY_TRIGGER_PHRASE → trigger.phrase
    /// - SKYY_STT_MODEL → stt.model
    /// - SKYY_AUDIO_DEVICE → listen.device
    /// - SKYY_CAMERA_DEVICE → camera.device
    /// - SKYY_OLLAMA_URL → ollama.url
    /// - SKYY_VISION_MODEL → vision.model
    /// - SKYY_TEXT_MODEL → composer.model
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(phrase) = non_empty_env("SKYY_TRIGGER_PHRASE") {
            self.trigger.phrase = phrase;
        }
        if let Some(model) = non_empty_env("SKYY_STT_MODEL") {
            self.stt.model = model;
        }
        if let Some(device) = non_empty_env("SKYY_AUDIO_DEVICE") {
            self.listen.device = Some(device);
        }
        if let Some(device) = non_empty_env("SKYY_CAMERA_DEVICE") {
            self.camera.device = device;
        }
        if let Some(url) = non_empty_env("SKYY_OLLAMA_URL") {
            self.ollama.url = url;
        }
        if let Some(model) = non_empty_env("SKYY_VISION_MODEL") {
            self.vision.model = model;
        }
        if let Some(model) = non_empty_env("SKYY_TEXT_MODEL") {
            self.composer.model = model;
        }
        self
    }

    /// Reject values the kiosk cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.trigger.phrase.split_whitespace().next().is_none() {
            return Err(invalid("trigger.phrase", "must contain at least one word"));
        }
        if !(0.0..=1.0).contains(&self.trigger.similarity_threshold) {
            return Err(invalid(
                "trigger.similarity_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.listen.timeout_secs == 0 {
            return Err(invalid("listen.timeout_secs", "must be positive"));
        }
        if self.listen.phrase_limit_secs == 0 {
            return Err(invalid("listen.phrase_limit_secs", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.listen.vad_threshold) {
            return Err(invalid("listen.vad_threshold", "must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.tts.volume) {
            return Err(invalid("tts.volume", "must be between 0.0 and 1.0"));
        }
        if self.vision.color_sample_step == 0 {
            return Err(invalid("vision.color_sample_step", "must be positive"));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(invalid("ollama.timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Honors `SKYY_CONFIG`, otherwise ~/.config/skyy/config.toml on Linux.
    pub fn default_path() -> PathBuf {
        if let Some(path) = non_empty_env("SKYY_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyy")
            .join("config.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn invalid(key: &str, message: &str) -> KioskError {
    KioskError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
