//! Errors recovered inside a kiosk cycle and where they are reported.

use crate::pipeline::orchestrator::CycleState;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A failure the kiosk recovered from, tagged with the stage it hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: CycleState,
    pub message: String,
}

impl StageError {
    pub fn new(stage: CycleState, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.stage, self.message)
    }
}

impl std::error::Error for StageError {}

/// Trait for reporting recovered errors.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &StageError);
}

/// Reporter that writes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &StageError) {
        tracing::warn!(stage = ?error.stage, "recovered: {}", error.message);
    }
}

/// Reporter that keeps every error in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    errors: Arc<Mutex<Vec<StageError>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<StageError> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, error: &StageError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let error = StageError::new(CycleState::Capturing, "camera unavailable");
        assert_eq!(error.to_string(), "Capturing: camera unavailable");
    }

    #[test]
    fn test_log_reporter() {
        // Just ensure it doesn't panic
        LogReporter.report(&StageError::new(CycleState::Speaking, "speaker busy"));
    }

    #[test]
    fn test_memory_reporter_shares_log_between_clones() {
        let reporter = MemoryReporter::new();
        let handle = reporter.clone();

        reporter.report(&StageError::new(CycleState::Composing, "boom"));

        assert_eq!(handle.errors().len(), 1);
        assert_eq!(handle.errors()[0].message, "boom");
    }
}
