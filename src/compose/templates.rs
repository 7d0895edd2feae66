//! Canned compliments.

use crate::vision::Emotion;
use crate::vision::palette::Color;

/// Universal fallback pool.
pub const GENERIC: &[&str] = &[
    "You have a presence that makes people feel welcome.",
    "You carry yourself with real grace.",
    "Something about you makes the whole room a little brighter.",
    "You seem like the kind of person people are lucky to know.",
    "Your energy is genuinely uplifting.",
];

pub const SMILE: &[&str] = &[
    "That smile of yours could brighten anyone's day!",
    "You have a wonderfully friendly smile.",
    "Your smile is warm and completely genuine.",
];

pub const EYES: &[&str] = &[
    "Your eyes have a lovely, lively sparkle.",
    "There's a real warmth in your eyes.",
    "Your eyes look curious and full of ideas.",
];

/// Line for a clothing color, if there is one.
pub fn color_line(color: Color) -> Option<&'static str> {
    match color {
        Color::Red => Some("That red looks bold and confident on you!"),
        Color::Blue => Some("That blue suits you beautifully."),
        Color::Green => Some("That green is a fantastic choice on you."),
        Color::Yellow => Some("That yellow gives you such a sunny look!"),
        Color::Purple => Some("That purple looks wonderfully striking."),
        Color::Black => Some("You pull off a sleek, elegant style."),
        Color::White => Some("You look crisp and put-together!"),
        Color::Neutral => None,
    }
}

/// Line for a facial expression.
pub fn emotion_line(emotion: Emotion) -> Option<&'static str> {
    match emotion {
        Emotion::Happy => Some("Your good mood is catching!"),
        Emotion::Neutral => Some("You have a calm, self-assured presence."),
        Emotion::Surprise => Some("You have such a lively, expressive face!"),
        Emotion::Sad => Some("You come across as thoughtful and deeply sincere."),
    }
}
