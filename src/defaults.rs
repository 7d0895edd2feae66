//! Default configuration constants for skyy.
//!
//! Shared by the config types and the components that fall back to them
//! when built outside of a loaded configuration.

/// Phrase that starts a request cycle.
pub const TRIGGER_PHRASE: &str = "Skyy, compliment me";

/// Minimum whole-string similarity for the trigger to match.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Number of trigger words that may be missing from the heard text.
pub const WORD_OVERLAP_TOLERANCE: usize = 1;

/// Seconds to wait for speech to start before giving up.
pub const LISTEN_TIMEOUT_SECS: u64 = 5;

/// Maximum length of a single utterance in seconds.
pub const PHRASE_LIMIT_SECS: u64 = 5;

/// Default audio sample rate in Hz.
///
/// 16kHz is what Whisper expects.
pub const SAMPLE_RATE: u32 = 16000;

/// Default Voice Activity Detection (VAD) threshold.
///
/// RMS level (0.0 to 1.0) above which a frame counts as speech.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Silence in milliseconds before an utterance is considered finished.
pub const SILENCE_DURATION_MS: u32 = 800;

/// Default Whisper model path.
pub const STT_MODEL_PATH: &str = "models/ggml-base.en.bin";

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Speaking rate in words per minute.
pub const TTS_RATE: u32 = 175;

/// Playback volume (0.0 to 1.0).
pub const TTS_VOLUME: f32 = 0.9;

/// Default camera device.
#[cfg(target_os = "macos")]
pub const CAMERA_DEVICE: &str = "0";
#[cfg(not(target_os = "macos"))]
pub const CAMERA_DEVICE: &str = "/dev/video0";

/// Frames discarded right after the camera is opened.
pub const CAMERA_WARMUP_FRAMES: u32 = 5;

/// Ollama server base URL.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Multimodal model used for scene descriptions.
pub const VISION_MODEL: &str = "gemma3:4b";

/// Text model used for compliment generation.
pub const TEXT_MODEL: &str = "gemma3:4b";

/// Seconds before an Ollama request is abandoned.
pub const BACKEND_TIMEOUT_SECS: u64 = 120;

/// Shortest generated compliment that is accepted.
pub const MIN_COMPLIMENT_LEN: usize = 20;

/// External command that prints `x y w h` for every detected face.
pub const FACE_COMMAND: &str = "facedetect";

/// Pixel stride used when averaging frame colors.
pub const COLOR_SAMPLE_STEP: u32 = 4;

/// Report the GPU backend compiled into this build.
///
/// Returns "CPU" when no GPU feature is enabled.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}
