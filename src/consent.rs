//! Verbal consent before any camera capture.
//!
//! Fail-closed: anything other than a recognizably affirmative reply is
//! treated as a refusal.

use crate::config::ListenConfig;
use crate::speech::SpeechIo;
use std::time::Duration;

/// Words that count as agreement when they appear anywhere in the reply.
const AFFIRMATIVE: [&str; 4] = ["yes", "sure", "okay", "ok"];

/// Result of asking for consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
    NoResponse,
}

/// What the gate says at each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentPrompts {
    pub question: String,
    pub no_response: String,
    pub granted: String,
    pub denied: String,
}

impl Default for ConsentPrompts {
    fn default() -> Self {
        Self {
            question: "May I take a quick look at you to come up with a compliment? Please say yes or no."
                .to_string(),
            no_response: "I didn't catch an answer, so I won't look. Your privacy comes first."
                .to_string(),
            granted: "Thank you! Hold still for just a moment.".to_string(),
            denied: "No problem, I won't look.".to_string(),
        }
    }
}

/// Asks for permission and classifies the answer.
#[derive(Debug, Clone)]
pub struct ConsentGate {
    timeout: Duration,
    phrase_limit: Duration,
    prompts: ConsentPrompts,
}

impl ConsentGate {
    pub fn new(timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            timeout,
            phrase_limit,
            prompts: ConsentPrompts::default(),
        }
    }

    pub fn from_config(listen: &ListenConfig) -> Self {
        Self::new(listen.timeout(), listen.phrase_limit())
    }

    pub fn with_prompts(mut self, prompts: ConsentPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Speak the question, listen once and classify the reply.
    pub fn decide(&self, speech: &mut SpeechIo) -> ConsentDecision {
        speech.speak(&self.prompts.question);

        let Some(reply) = speech.listen(self.timeout, self.phrase_limit) else {
            speech.speak(&self.prompts.no_response);
            return ConsentDecision::NoResponse;
        };

        if is_affirmative(&reply) {
            tracing::info!("consent granted");
            speech.speak(&self.prompts.granted);
            ConsentDecision::Granted
        } else {
            tracing::info!(reply = %reply, "consent denied");
            speech.speak(&self.prompts.denied);
            ConsentDecision::Denied
        }
    }

    /// True only when consent was explicitly granted.
    pub fn request_permission(&self, speech: &mut SpeechIo) -> bool {
        self.decide(speech) == ConsentDecision::Granted
    }
}

/// Substring check against the affirmative words, case-insensitive.
///
/// Containment, not word equality: "okay then" and "yes!" both pass.
pub fn is_affirmative(reply: &str) -> bool {
    let reply = reply.to_lowercase();
    AFFIRMATIVE.iter().any(|word| reply.contains(word))
}
