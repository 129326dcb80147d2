//! Spoken phrase classification
//!
//! Confirmation and rejection match on whole words inside the utterance,
//! so "yes please" and "no thanks" work but the "no" in "now" or "know"
//! does not count as a rejection. Abort and timer-stop phrases match
//! exactly so "stop" inside a longer sentence never kills the
//! conversation.

use std::sync::LazyLock;

use regex::Regex;

const CONFIRM_PHRASES: &[&str] = &[
    "yes", "yeah", "yep", "sure", "okay", "ok", "confirm", "do it", "go ahead", "proceed",
    "clear", "done", "got it",
];

const REJECT_PHRASES: &[&str] = &[
    "no", "nope", "cancel", "nevermind", "never mind", "don't", "stop",
];

const ABORT_PHRASES: &[&str] = &["stop", "nevermind", "never mind", "cancel", "forget it"];

const TIMER_STOP_PHRASES: &[&str] = &["stop", "stop the timer", "stop timer"];

static SNOOZE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:remind|tell|ask)\s+me\s+(?:again\s+)?in\s+(\d+)\s*(?:minute|min)",
        r"(?:snooze|delay|postpone)(?:\s+(?:it|for))?\s+(\d+)\s*(?:minute|min)",
        r"(\d+)\s*(?:minute|min)(?:\s+(?:later|from now))?",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn normalized(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase()
}

/// Whether `phrase` occurs in `text` with word boundaries on both sides
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let mut from = 0;
    while let Some(offset) = text[from..].find(phrase) {
        let begin = from + offset;
        let end = begin + phrase.len();
        let left_clear = !text[..begin]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric);
        let right_clear = !text[end..].chars().next().is_some_and(char::is_alphanumeric);
        if left_clear && right_clear {
            return true;
        }
        from = begin + 1;
    }
    false
}

/// Whether the utterance affirms a pending action
#[must_use]
pub fn is_confirmation(text: &str) -> bool {
    let text = normalized(text);
    CONFIRM_PHRASES.iter().any(|p| contains_phrase(&text, p))
}

/// Whether the utterance declines a pending action
#[must_use]
pub fn is_rejection(text: &str) -> bool {
    let text = normalized(text);
    REJECT_PHRASES.iter().any(|p| contains_phrase(&text, p))
}

/// Whether the utterance is an exact conversation-ending command
#[must_use]
pub fn is_abort(text: &str) -> bool {
    let text = normalized(text);
    ABORT_PHRASES.iter().any(|p| text == *p)
}

/// Whether the utterance is an exact stop-the-alarm command
#[must_use]
pub fn is_timer_stop(text: &str) -> bool {
    let text = normalized(text);
    TIMER_STOP_PHRASES.iter().any(|p| text == *p)
}

/// Extract a snooze interval in minutes, e.g. "remind me again in 15 minutes"
#[must_use]
pub fn parse_snooze_minutes(text: &str) -> Option<i64> {
    let text = normalized(text);
    SNOOZE_PATTERNS
        .iter()
        .find_map(|re| re.captures(&text))
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_matches_whole_words() {
        assert!(is_confirmation("yes"));
        assert!(is_confirmation("Yes please!"));
        assert!(is_confirmation("okay, go ahead"));
        assert!(is_confirmation("do it now"));
        assert!(!is_confirmation("maybe later"));
        // "ok" embedded in another word is not an affirmation
        assert!(!is_confirmation("it's broken"));
    }

    #[test]
    fn test_rejection_matches_whole_words() {
        assert!(is_rejection("no"));
        assert!(is_rejection("no thanks"));
        assert!(is_rejection("never mind"));
        assert!(!is_rejection("yes"));
        // The "no" inside "now" and "know" is not a rejection
        assert!(!is_rejection("do it now"));
        assert!(!is_rejection("you know what, do it"));
    }

    #[test]
    fn test_abort_is_exact() {
        assert!(is_abort("stop"));
        assert!(is_abort("Forget it."));
        // Embedded occurrences do not abort
        assert!(!is_abort("stop the music"));
        assert!(!is_abort("please cancel my meeting"));
    }

    #[test]
    fn test_timer_stop_is_exact() {
        assert!(is_timer_stop("stop"));
        assert!(is_timer_stop("stop the timer"));
        assert!(!is_timer_stop("stop everything now"));
    }

    #[test]
    fn test_snooze_variants() {
        assert_eq!(parse_snooze_minutes("remind me again in 15 minutes"), Some(15));
        assert_eq!(parse_snooze_minutes("ask me in 5 min"), Some(5));
        assert_eq!(parse_snooze_minutes("snooze 10 minutes"), Some(10));
        assert_eq!(parse_snooze_minutes("postpone it 20 minutes"), Some(20));
        assert_eq!(parse_snooze_minutes("30 minutes later"), Some(30));
        assert_eq!(parse_snooze_minutes("clear it"), None);
    }
}
