//! Cleanup and acceptance checks for generated compliments.

use crate::error::{KioskError, Result};

/// Phrases that signal a refusal rather than a compliment.
const REFUSAL_MARKERS: [&str; 2] = ["sorry", "cannot"];

/// Clean up a model reply and decide whether it can be spoken.
///
/// `prompt` is removed if the model echoed it. `description` is the scene
/// description the prompt was built from; a reply that merely repeats it is
/// rejected. Returns the cleaned text, ending in punctuation.
///
/// # Errors
/// `QualityRejection` naming the failed check.
pub fn validate_reply(
    reply: &str,
    prompt: &str,
    description: Option<&str>,
    min_len: usize,
) -> Result<String> {
    let text = clean(reply, prompt);

    if text.chars().count() < min_len {
        return Err(reject(format!(
            "too short ({} chars, need {})",
            text.chars().count(),
            min_len
        )));
    }

    let lower = text.to_lowercase();
    if let Some(marker) = REFUSAL_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Err(reject(format!("contains '{marker}'")));
    }
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty())
        && lower.contains(&description.to_lowercase())
    {
        return Err(reject("repeats the scene description".to_string()));
    }

    Ok(finish_sentence(text))
}

fn reject(reason: String) -> KioskError {
    KioskError::QualityRejection { reason }
}

/// Strip prompt echo, markdown emphasis, list markers, a leading label and
/// wrapping quotes.
fn clean(reply: &str, prompt: &str) -> String {
    let mut text = reply.to_string();
    let prompt = prompt.trim();
    if !prompt.is_empty() {
        text = text.replace(prompt, "");
    }
    text.retain(|c| !matches!(c, '*' | '_' | '#' | '`'));

    let mut text = strip_list_marker(text.trim());
    if let Some((label, rest)) = text.split_once(':')
        && label.split_whitespace().count() <= 4
        && label.to_lowercase().contains("compliment")
    {
        text = rest.trim();
    }

    text.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”') || c.is_whitespace())
        .to_string()
}

/// Drop a leading bullet (`-`, `*`, `•`) or number (`1.`, `2)`).
fn strip_list_marker(text: &str) -> &str {
    let rest = text.trim_start_matches(['-', '*', '•', '–']);
    if rest.len() != text.len() {
        return rest.trim_start();
    }
    let digits = text.len() - text.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0
        && let Some(rest) = text[digits..]
            .strip_prefix('.')
            .or_else(|| text[digits..].strip_prefix(')'))
        && rest.starts_with(char::is_whitespace)
    {
        return rest.trim_start();
    }
    text
}

fn finish_sentence(mut text: String) -> String {
    if text.chars().last().is_some_and(char::is_alphanumeric) {
        text.push('.');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "Give a kind compliment to someone who appears happy:";

    #[test]
    fn test_accepts_and_punctuates() {
        let text = validate_reply("You light up every room you walk into", PROMPT, None, 20).unwrap();
        assert_eq!(text, "You light up every room you walk into.");
    }

    #[test]
    fn test_keeps_existing_punctuation() {
        let text = validate_reply("You have impeccable taste!", PROMPT, None, 20).unwrap();
        assert_eq!(text, "You have impeccable taste!");
    }

    #[test]
    fn test_strips_markdown_label_and_quotes() {
        let text = validate_reply(
            "**Compliment:** \"Your style is effortlessly cool\"",
            PROMPT,
            None,
            20,
        )
        .unwrap();
        assert_eq!(text, "Your style is effortlessly cool.");
    }

    #[test]
    fn test_strips_list_bullets() {
        for reply in [
            "- Your smile brightens the whole room",
            "• Your smile brightens the whole room",
            "* Your smile brightens the whole room",
            "1. Your smile brightens the whole room",
            "2) \"Your smile brightens the whole room\"",
        ] {
            let text = validate_reply(reply, PROMPT, None, 20).unwrap();
            assert_eq!(text, "Your smile brightens the whole room.", "reply: {reply}");
        }
    }

    #[test]
    fn test_keeps_leading_numbers_that_are_not_list_markers() {
        let text = validate_reply("100 people would envy that jacket", PROMPT, None, 20).unwrap();
        assert_eq!(text, "100 people would envy that jacket.");
    }

    #[test]
    fn test_strips_echoed_prompt() {
        let reply = format!("{PROMPT} Your cheerfulness is a gift to everyone around you.");
        let text = validate_reply(&reply, PROMPT, None, 20).unwrap();
        assert_eq!(text, "Your cheerfulness is a gift to everyone around you.");
    }

    #[test]
    fn test_rejects_short_reply_after_cleanup() {
        assert!(matches!(
            validate_reply("\"Nice hat\"", PROMPT, None, 20),
            Err(KioskError::QualityRejection { .. })
        ));
    }

    #[test]
    fn test_rejects_refusals() {
        for reply in [
            "Sorry, I can't comment on people's appearance.",
            "I CANNOT do that, but you seem nice.",
        ] {
            match validate_reply(reply, PROMPT, None, 20) {
                Err(KioskError::QualityRejection { reason }) => assert!(reason.contains("contains")),
                other => panic!("Expected rejection, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rejects_reply_containing_description() {
        let description = "A person with short hair wearing a blue hoodie";
        let reply = "a person with short hair wearing a blue hoodie, looking great";

        assert!(validate_reply(reply, PROMPT, Some(description), 20).is_err());
    }

    #[test]
    fn test_blank_description_does_not_reject() {
        let text =
            validate_reply("Your jacket looks fantastic today", PROMPT, Some("  "), 20).unwrap();
        assert_eq!(text, "Your jacket looks fantastic today.");
    }
}
