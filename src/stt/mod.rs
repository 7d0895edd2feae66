//! Speech-to-text.

pub mod transcriber;
pub mod whisper;
