//! Whisper-based speech-to-text transcription.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake at build time).
//! Without it `WhisperTranscriber` still validates its model path but every
//! transcription fails with a descriptive error.

use crate::defaults;
use crate::error::{KioskError, Result};
use crate::stt::transcriber::Transcriber;
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en"), or "auto" for detection
    pub language: String,
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(defaults::STT_MODEL_PATH),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl From<&crate::config::SttConfig> for WhisperConfig {
    fn from(stt: &crate::config::SttConfig) -> Self {
        Self {
            model_path: PathBuf::from(&stt.model),
            language: stt.language.clone(),
            threads: stt.threads,
        }
    }
}

fn model_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn ensure_model_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(KioskError::TranscriptionModelNotFound {
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// Convert i16 PCM to the f32 range [-1.0, 1.0] whisper.cpp expects.
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Whisper-based transcriber.
///
/// The context is loaded once at startup and shared behind a mutex; each
/// call creates a fresh decoding state.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Placeholder used when the crate is built without the `whisper` feature.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Load a Whisper model.
    ///
    /// # Errors
    /// `TranscriptionModelNotFound` if the file is missing, `Transcription`
    /// if whisper.cpp cannot load it.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        ensure_model_exists(&config.model_path)?;
        let model_name = model_name_from_path(&config.model_path);

        let model_path = config
            .model_path
            .to_str()
            .ok_or_else(|| KioskError::Transcription {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context =
            WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
                .map_err(|e| KioskError::Transcription {
                    message: format!("Failed to load Whisper model: {}", e),
                })?;

        tracing::info!(model = %model_name, "whisper model loaded");
        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Validate the model path; transcription itself is unavailable.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        ensure_model_exists(&config.model_path)?;
        let model_name = model_name_from_path(&config.model_path);
        tracing::warn!("built without the whisper feature; speech will not be recognized");
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let audio_f32 = convert_audio(audio);

        let context = self.context.lock().map_err(|e| KioskError::Transcription {
            message: format!("Failed to acquire context lock: {}", e),
        })?;

        let mut state = context
            .create_state()
            .map_err(|e| KioskError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| KioskError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut transcription = String::new();
        for segment in state.as_iter() {
            transcription.push_str(&segment.to_string());
        }
        Ok(transcription.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        Err(KioskError::Transcription {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
