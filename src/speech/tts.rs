//! Text-to-speech through a system synthesis command.
//!
//! `espeak-ng` on Linux, `say` on macOS. Playback is synchronous: `speak`
//! returns once the command exits.

use crate::config::TtsConfig;
use crate::error::{KioskError, Result};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use std::sync::{Arc, Mutex};

#[cfg(target_os = "macos")]
const DEFAULT_COMMAND: &str = "say";
#[cfg(not(target_os = "macos"))]
const DEFAULT_COMMAND: &str = "espeak-ng";

/// Trait for speech output.
pub trait Speaker: Send {
    /// Speak `text`, blocking until playback finishes.
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Speaker that shells out to a synthesis command.
pub struct CommandSpeaker<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    command: String,
    voice: Option<String>,
    rate: u32,
    volume: f32,
}

impl CommandSpeaker<SystemCommandExecutor> {
    pub fn from_config(config: &TtsConfig) -> Self {
        Self::with_executor(config, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> CommandSpeaker<E> {
    pub fn with_executor(config: &TtsConfig, executor: E) -> Self {
        Self {
            executor,
            command: config
                .command
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            voice: config.voice.clone(),
            rate: config.rate,
            volume: config.volume,
        }
    }

    /// Arguments for the configured command.
    fn args(&self, text: &str) -> Vec<String> {
        let mut args = Vec::new();
        if self.command.ends_with("say") {
            // `say` has no volume flag.
            args.extend(["-r".to_string(), self.rate.to_string()]);
        } else {
            // espeak amplitude runs 0..200, 100 being normal.
            let amplitude = (self.volume.clamp(0.0, 1.0) * 200.0).round() as u32;
            args.extend([
                "-s".to_string(),
                self.rate.to_string(),
                "-a".to_string(),
                amplitude.to_string(),
            ]);
        }
        if let Some(voice) = &self.voice {
            args.extend(["-v".to_string(), voice.clone()]);
        }
        // Text may start with '-' and must not be read as an option.
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

impl<E: CommandExecutor> Speaker for CommandSpeaker<E> {
    fn speak(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(KioskError::Speech {
                message: "nothing to say".to_string(),
            });
        }
        tracing::info!("speaking: {}", text);

        let args = self.args(text);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.executor
            .execute(&self.command, &args)
            .map(|_| ())
            .map_err(|e| KioskError::Speech {
                message: e.to_string(),
            })
    }
}

/// Mock speaker for testing.
///
/// Records every utterance; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MockSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
}

impl MockSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail every call (the text is still logged).
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Everything spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .map(|spoken| spoken.clone())
            .unwrap_or_default()
    }
}

impl Speaker for MockSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        if self.should_fail {
            return Err(KioskError::Speech {
                message: "mock speech failure".to_string(),
            });
        }
        Ok(())
    }
}
