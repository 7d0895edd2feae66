//! Compliment composition.
//!
//! Turns a [`SceneObservation`] into text to speak. Composition never
//! fails: every error path ends in the generic pool.

pub mod templates;
pub mod validate;

use crate::backend::TextGenerator;
use crate::defaults;
use crate::vision::{SceneFeatures, SceneObservation};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use templates::{EYES, GENERIC, SMILE};

/// Where a compliment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Written by the text generator and accepted by validation.
    Generated,
    /// Picked from feature-specific templates.
    Template,
    /// Picked from the generic pool.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compliment {
    pub text: String,
    pub source: Provenance,
}

impl Compliment {
    fn new(text: impl Into<String>, source: Provenance) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

pub struct ComplimentComposer {
    generator: Option<Box<dyn TextGenerator>>,
    min_length: usize,
    rng: StdRng,
}

impl ComplimentComposer {
    pub fn new(generator: Option<Box<dyn TextGenerator>>, min_length: usize) -> Self {
        Self::with_rng(generator, min_length, StdRng::from_entropy())
    }

    /// Deterministic composer for tests.
    pub fn with_seed(generator: Option<Box<dyn TextGenerator>>, seed: u64) -> Self {
        Self::with_rng(
            generator,
            defaults::MIN_COMPLIMENT_LEN,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(generator: Option<Box<dyn TextGenerator>>, min_length: usize, rng: StdRng) -> Self {
        Self {
            generator,
            min_length,
            rng,
        }
    }

    pub fn generate_compliment(&mut self, observation: &SceneObservation) -> Compliment {
        match observation {
            SceneObservation::Failed(error) => {
                tracing::debug!(error = %error, "no usable observation, using generic compliment");
                self.generic()
            }
            SceneObservation::Description(description) => {
                let prompt = description_prompt(description);
                match self.generate(&prompt, Some(description)) {
                    Some(text) => Compliment::new(text, Provenance::Generated),
                    None => self.generic(),
                }
            }
            SceneObservation::Features(features) => {
                let prompt = feature_prompt(features);
                match self.generate(&prompt, None) {
                    Some(text) => Compliment::new(text, Provenance::Generated),
                    None => self.template(features),
                }
            }
        }
    }

    /// One attempt at the text generator; `None` if there is none, it
    /// fails, or its reply is rejected.
    fn generate(&self, prompt: &str, description: Option<&str>) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let reply = generator
            .generate(prompt)
            .inspect_err(|e| tracing::warn!("compliment generation failed: {}", e))
            .ok()?;
        validate::validate_reply(&reply, prompt, description, self.min_length)
            .inspect(|text| tracing::info!(backend = generator.name(), "generated: {}", text))
            .inspect_err(|e| tracing::info!(reply = %reply, "{}", e))
            .ok()
    }

    /// Random member of the generic pool.
    pub fn generic(&mut self) -> Compliment {
        Compliment::new(pick(&mut self.rng, GENERIC), Provenance::Generic)
    }

    fn template(&mut self, features: &SceneFeatures) -> Compliment {
        let candidates = self.template_candidates(features);
        match candidates.choose(&mut self.rng) {
            Some(line) => Compliment::new(*line, Provenance::Template),
            None => self.generic(),
        }
    }

    /// Feature-specific lines, in order: smile, first known color, emotion,
    /// eyes. The eyes line is always present.
    pub fn template_candidates(&mut self, features: &SceneFeatures) -> Vec<&'static str> {
        let mut candidates = Vec::new();
        if features.face_detected {
            candidates.push(pick(&mut self.rng, SMILE));
        }
        if let Some(line) = features.colors.iter().find_map(|c| templates::color_line(*c)) {
            candidates.push(line);
        }
        if let Some(line) = features.emotion.and_then(templates::emotion_line) {
            candidates.push(line);
        }
        candidates.push(pick(&mut self.rng, EYES));
        candidates
    }
}

fn pick(rng: &mut StdRng, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or(GENERIC[0])
}

/// Prompt asking for a compliment about a described person.
pub fn description_prompt(description: &str) -> String {
    format!(
        "You are a friendly assistant at a kiosk who gives short, sincere compliments. \
         Here is a description of the person in front of you: \"{description}\". \
         Write one warm compliment of one or two sentences, speaking directly to them. \
         Do not repeat the description. Reply with the compliment only."
    )
}

/// Prompt built from structured features.
pub fn feature_prompt(features: &SceneFeatures) -> String {
    let mut prompt = String::from("Give a kind compliment to someone who ");
    if let Some(emotion) = features.emotion {
        prompt.push_str(&format!("appears {}, ", emotion.as_str()));
    }
    let colors: Vec<&str> = features
        .colors
        .iter()
        .filter(|c| templates::color_line(**c).is_some())
        .map(|c| c.as_str())
        .collect();
    if !colors.is_empty() {
        prompt.push_str(&format!("is wearing {}, ", colors.join(", ")));
    }
    prompt.push_str("and deserves to feel appreciated:");
    prompt
}
