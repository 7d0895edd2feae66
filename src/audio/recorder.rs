use crate::error::{KioskError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real microphone vs mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Drain the samples captured since the previous read.
    ///
    /// # Returns
    /// 16-bit PCM mono samples at 16kHz; empty if nothing arrived yet.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing.
///
/// Each `read_samples` call pops the next scripted chunk; once the script
/// is exhausted it keeps returning silence of the last chunk's length.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    chunks: VecDeque<Vec<i16>>,
    tail_len: usize,
    is_started: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
    starts: Arc<AtomicUsize>,
}

impl MockAudioSource {
    /// Create a new mock source that only produces silence.
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            tail_len: 160,
            is_started: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append a chunk to the read script.
    pub fn with_chunk(mut self, chunk: Vec<i16>) -> Self {
        self.tail_len = chunk.len();
        self.chunks.push_back(chunk);
        self
    }

    /// Append `count` copies of a chunk to the read script.
    pub fn with_repeated(mut self, chunk: Vec<i16>, count: usize) -> Self {
        for _ in 0..count {
            self = self.with_chunk(chunk.clone());
        }
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Shared counter of successful `start` calls.
    pub fn start_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }

    fn failure(&self) -> KioskError {
        KioskError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(self.failure());
        }
        self.is_started = true;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(self.failure());
        }
        Ok(self
            .chunks
            .pop_front()
            .unwrap_or_else(|| vec![0i16; self.tail_len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_audio_source_plays_script_in_order() {
        let mut source = MockAudioSource::new()
            .with_chunk(vec![1i16, 2, 3])
            .with_chunk(vec![4i16, 5, 6]);

        assert_eq!(source.read_samples().unwrap(), vec![1, 2, 3]);
        assert_eq!(source.read_samples().unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_mock_audio_source_falls_back_to_silence() {
        let mut source = MockAudioSource::new().with_chunk(vec![900i16; 4]);

        source.read_samples().unwrap();
        let tail = source.read_samples().unwrap();
        assert_eq!(tail, vec![0i16; 4]);
    }

    #[test]
    fn test_mock_audio_source_default_is_silence() {
        let mut source = MockAudioSource::new();

        let samples = source.read_samples().unwrap();
        assert_eq!(samples.len(), 160);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mock_audio_source_repeated_chunks() {
        let mut source = MockAudioSource::new().with_repeated(vec![7i16; 2], 3);

        for _ in 0..3 {
            assert_eq!(source.read_samples().unwrap(), vec![7i16, 7]);
        }
        assert_eq!(source.read_samples().unwrap(), vec![0i16, 0]);
    }

    #[test]
    fn test_mock_audio_source_returns_custom_read_error() {
        let mut source = MockAudioSource::new()
            .with_read_failure()
            .with_error_message("buffer overflow");

        match source.read_samples() {
            Err(KioskError::AudioCapture { message }) => {
                assert_eq!(message, "buffer overflow");
            }
            other => panic!("Expected AudioCapture error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_audio_source_start_stop_state_management() {
        let mut source = MockAudioSource::new();
        let starts = source.start_count();

        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mock_audio_source_start_failure() {
        let mut source = MockAudioSource::new().with_start_failure();

        assert!(source.start().is_err());
        assert!(!source.is_started());
    }

    #[test]
    fn test_audio_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_chunk(vec![1i16, 2, 3, 4, 5]));

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1i16, 2, 3, 4, 5]);
        source.stop().unwrap();
    }
}
