//! Microphone input: device capture, voice activity detection and
//! single-utterance recording.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod recorder;
pub mod utterance;
pub mod vad;
