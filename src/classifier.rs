//! Signal classifier - keyword and pattern rules, kept apart from the state machines
//!
//! Everything site-specific lives behind [`SignalClassifier`], so localized
//! phrase lists or a different page layout only need a new classifier.

use regex::Regex;

use crate::config::SignalConfig;

/// What a page title says, before any state is consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleClass {
    /// Parenthesized unread count, kept as the raw digit string
    Count(String),
    /// "Someone is typing" style title; carries no badge information
    Typing,
    /// Incoming-call banner title
    Call,
    /// The idle app page, e.g. the bare app name
    Home,
    /// A transient page title that says nothing about unread state
    Other,
}

/// What a scraped conversation row body represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBody {
    Message,
    /// Presence or placeholder text, no message content
    Status,
    /// Last message was sent by the user
    OwnMessage,
}

pub trait SignalClassifier: Send + Sync {
    /// The call keyword found in `text`, if any
    fn match_call(&self, text: &str) -> Option<String>;

    fn classify_title(&self, title: &str) -> TitleClass;

    fn is_blocked_sender(&self, title: &str) -> bool;

    fn classify_row_body(&self, body: &str) -> RowBody;
}

/// Case-insensitive substring matching over the configured phrase lists
pub struct KeywordClassifier {
    call_keywords: Vec<String>,
    typing_phrases: Vec<String>,
    status_phrases: Vec<String>,
    skip_prefixes: Vec<String>,
    blocked_senders: Vec<String>,
    home_titles: Vec<String>,
    badge_pattern: Regex,
}

impl KeywordClassifier {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            call_keywords: lowercase_all(&config.call_keywords),
            typing_phrases: lowercase_all(&config.typing_phrases),
            status_phrases: lowercase_all(&config.status_phrases),
            skip_prefixes: lowercase_all(&config.skip_prefixes),
            blocked_senders: lowercase_all(&config.blocked_senders),
            home_titles: lowercase_all(&config.home_titles),
            badge_pattern: Regex::new(r"\((\d+)\)").expect("badge pattern is valid"),
        }
    }

    /// Raw digit string of the first `(N)` in the title
    pub fn badge_digits<'a>(&self, title: &'a str) -> Option<&'a str> {
        self.badge_pattern
            .captures(title)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&SignalConfig::default())
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl SignalClassifier for KeywordClassifier {
    fn match_call(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        self.call_keywords
            .iter()
            .find(|keyword| lowered.contains(keyword.as_str()))
            .cloned()
    }

    fn classify_title(&self, title: &str) -> TitleClass {
        if let Some(digits) = self.badge_digits(title) {
            return TitleClass::Count(digits.to_string());
        }

        let lowered = title.to_lowercase();
        if self
            .typing_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
        {
            return TitleClass::Typing;
        }
        if self.match_call(title).is_some() {
            return TitleClass::Call;
        }
        if self.home_titles.is_empty()
            || self
                .home_titles
                .iter()
                .any(|home| lowered.contains(home.as_str()))
        {
            return TitleClass::Home;
        }
        TitleClass::Other
    }

    fn is_blocked_sender(&self, title: &str) -> bool {
        let lowered = title.to_lowercase();
        self.blocked_senders
            .iter()
            .any(|name| lowered.contains(name.as_str()))
    }

    fn classify_row_body(&self, body: &str) -> RowBody {
        let lowered = body.trim().to_lowercase();
        if self.skip_prefixes.iter().any(|p| lowered.starts_with(p.as_str())) {
            return RowBody::OwnMessage;
        }
        if self.status_phrases.iter().any(|p| lowered == *p) {
            return RowBody::Status;
        }
        RowBody::Message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_anywhere_in_title() {
        let classifier = KeywordClassifier::default();
        assert_eq!(
            classifier.classify_title("(3) Messenger"),
            TitleClass::Count("3".to_string())
        );
        assert_eq!(
            classifier.classify_title("Messenger (12)"),
            TitleClass::Count("12".to_string())
        );
        // A count wins over a typing phrase in the same title
        assert_eq!(
            classifier.classify_title("(2) Alice is typing"),
            TitleClass::Count("2".to_string())
        );
    }

    #[test]
    fn test_typing_titles() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify_title("Alice píše!"), TitleClass::Typing);
        assert_eq!(classifier.classify_title("Bob is typing…"), TitleClass::Typing);
        assert_eq!(classifier.classify_title("BOB IS TYPING"), TitleClass::Typing);
    }

    #[test]
    fn test_home_other_and_call_titles() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify_title("Messenger"), TitleClass::Home);
        assert_eq!(classifier.classify_title("(x) Messenger"), TitleClass::Home);
        assert_eq!(classifier.classify_title("Marketplace"), TitleClass::Other);
        assert_eq!(classifier.classify_title("Alice volá"), TitleClass::Call);
    }

    #[test]
    fn test_empty_home_titles_treat_everything_as_home() {
        let config = SignalConfig {
            home_titles: Vec::new(),
            ..SignalConfig::default()
        };
        let classifier = KeywordClassifier::new(&config);
        assert_eq!(classifier.classify_title("Marketplace"), TitleClass::Home);
    }

    #[test]
    fn test_match_call_is_case_insensitive() {
        let classifier = KeywordClassifier::default();
        assert_eq!(
            classifier.match_call("Alice IS CALLING you"),
            Some("is calling".to_string())
        );
        assert_eq!(classifier.match_call("Alice volá"), Some("volá".to_string()));
        assert_eq!(classifier.match_call("Alice: calling it a day"), None);
    }

    #[test]
    fn test_custom_keywords() {
        let config = SignalConfig {
            call_keywords: vec!["  Ringing ".to_string(), "".to_string()],
            ..SignalConfig::default()
        };
        let classifier = KeywordClassifier::new(&config);
        assert!(classifier.match_call("phone ringing").is_some());
        assert!(classifier.match_call("Alice is calling").is_none());
        assert!(classifier.match_call("anything").is_none());
    }

    #[test]
    fn test_blocked_sender() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_blocked_sender("Messenger"));
        assert!(classifier.is_blocked_sender("Facebook messenger team"));
        assert!(!classifier.is_blocked_sender("Bob"));
    }

    #[test]
    fn test_row_body() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify_row_body("hey there"), RowBody::Message);
        assert_eq!(classifier.classify_row_body("You: ok see you"), RowBody::OwnMessage);
        assert_eq!(classifier.classify_row_body("Active now"), RowBody::Status);
        assert_eq!(classifier.classify_row_body("active now "), RowBody::Status);
    }
}
