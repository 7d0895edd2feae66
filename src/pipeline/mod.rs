//! The kiosk request cycle.
//!
//! Trigger, consent, capture, compose, speak: one linear pass per cycle,
//! repeated until the kiosk is stopped.

pub mod error;
pub mod orchestrator;

pub use error::{ErrorReporter, LogReporter, MemoryReporter, StageError};
pub use orchestrator::{CycleOutcome, CycleState, Kiosk, KioskConfig, RunSummary};
