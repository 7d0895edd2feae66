//! Trigger phrase matching.
//!
//! Speech recognition rarely reproduces the phrase exactly, so a match is
//! accepted on either whole-string similarity or word overlap.

use crate::defaults;
use std::collections::HashSet;

/// Decides whether heard text counts as the trigger phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerMatcher {
    /// Minimum similarity ratio (0.0 to 1.0).
    pub threshold: f64,
    /// Trigger words allowed to be missing from the heard text.
    pub tolerance: usize,
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self {
            threshold: defaults::SIMILARITY_THRESHOLD,
            tolerance: defaults::WORD_OVERLAP_TOLERANCE,
        }
    }
}

impl TriggerMatcher {
    pub fn new(threshold: f64, tolerance: usize) -> Self {
        Self {
            threshold,
            tolerance,
        }
    }

    /// True if `heard` is close enough to `phrase`.
    ///
    /// Both sides are lowercased. Empty heard text never matches.
    pub fn matches(&self, heard: &str, phrase: &str) -> bool {
        let heard = heard.trim().to_lowercase();
        let phrase = phrase.trim().to_lowercase();
        if heard.is_empty() {
            return false;
        }

        let ratio = similarity(&heard, &phrase);
        if ratio >= self.threshold {
            tracing::debug!(ratio, "trigger matched on similarity");
            return true;
        }

        // Repeated words count once on both sides.
        let trigger_words: HashSet<String> = words(&phrase).into_iter().collect();
        let heard_words: HashSet<String> = words(&heard).into_iter().collect();
        let overlap = trigger_words
            .iter()
            .filter(|word| heard_words.contains(*word))
            .count();
        let required = trigger_words.len().saturating_sub(self.tolerance).max(1);

        let matched = overlap >= required;
        if matched {
            tracing::debug!(overlap, required, "trigger matched on word overlap");
        }
        matched
    }
}

/// Whitespace-split words with surrounding punctuation removed.
fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Similarity ratio in [0.0, 1.0]: one minus the edit distance over the
/// longer length. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Levenshtein edit distance between two strings (character-level).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
