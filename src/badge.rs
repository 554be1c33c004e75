//! Unread badge extraction from the page title
//!
//! The page writes its unread count as `(N)` somewhere in the title. Between
//! counts the title flips to typing indicators, call banners or the bare app
//! name, and it repeats the same count with different surrounding text. Only
//! a change of the digit string is an event.

use tracing::debug;

use crate::classifier::{SignalClassifier, TitleClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeEvent {
    CountChanged(u32),
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeState {
    /// Last digit string seen; `Some("0")` and `None` are different states
    pub last_raw_count: Option<String>,
    /// Count currently shown by the delivery sink
    pub last_unread_count: u32,
    /// Count waiting for sender verification before it may be shown
    pub pending_count: Option<u32>,
}

#[derive(Debug, Default)]
pub struct BadgeExtractor {
    state: BadgeState,
}

impl BadgeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BadgeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BadgeState {
        &mut self.state
    }

    /// Classify the latest title; `None` means the title went away
    pub fn extract(
        &mut self,
        title: Option<&str>,
        classifier: &dyn SignalClassifier,
    ) -> Option<BadgeEvent> {
        let Some(title) = title else {
            self.state.last_raw_count = None;
            return Some(BadgeEvent::Cleared);
        };

        match classifier.classify_title(title) {
            TitleClass::Count(raw) => {
                if self.state.last_raw_count.as_deref() == Some(raw.as_str()) {
                    debug!(count = %raw, "Badge unchanged, skipping");
                    return None;
                }
                let count = parse_count(&raw);
                self.state.last_raw_count = Some(raw);
                Some(BadgeEvent::CountChanged(count))
            }
            TitleClass::Typing | TitleClass::Call | TitleClass::Other => {
                debug!(title = %title, "Ignoring transient title");
                None
            }
            TitleClass::Home => {
                self.state.last_raw_count.take()?;
                Some(BadgeEvent::Cleared)
            }
        }
    }
}

/// Digits only, so the sole failure is overflow
fn parse_count(raw: &str) -> u32 {
    raw.parse().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;

    #[test]
    fn test_repeated_count_emits_once() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        assert_eq!(
            badge.extract(Some("(3) Messenger"), &classifier),
            Some(BadgeEvent::CountChanged(3))
        );
        assert_eq!(badge.extract(Some("(3) Messenger"), &classifier), None);
        // Same digits, different decoration
        assert_eq!(badge.extract(Some("Messenger (3)"), &classifier), None);
        assert_eq!(
            badge.extract(Some("(4) Messenger"), &classifier),
            Some(BadgeEvent::CountChanged(4))
        );
    }

    #[test]
    fn test_absent_title_always_clears() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        assert_eq!(badge.extract(None, &classifier), Some(BadgeEvent::Cleared));
        badge.extract(Some("(2) Messenger"), &classifier);
        assert_eq!(badge.extract(None, &classifier), Some(BadgeEvent::Cleared));
        assert_eq!(badge.state().last_raw_count, None);
        assert_eq!(
            badge.extract(Some("(2) Messenger"), &classifier),
            Some(BadgeEvent::CountChanged(2))
        );
    }

    #[test]
    fn test_typing_indicator_keeps_state() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        badge.extract(Some("(1) Messenger"), &classifier);
        assert_eq!(badge.extract(Some("Alice píše!"), &classifier), None);
        assert_eq!(badge.state().last_raw_count.as_deref(), Some("1"));
        assert_eq!(badge.extract(Some("(1) Messenger"), &classifier), None);
    }

    #[test]
    fn test_call_banner_keeps_state() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        badge.extract(Some("(1) Messenger"), &classifier);
        assert_eq!(badge.extract(Some("Alice volá"), &classifier), None);
        assert_eq!(badge.state().last_raw_count.as_deref(), Some("1"));
    }

    #[test]
    fn test_neutral_title_clears_only_after_count() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        assert_eq!(badge.extract(Some("Messenger"), &classifier), None);
        badge.extract(Some("(5) Messenger"), &classifier);
        assert_eq!(
            badge.extract(Some("Messenger"), &classifier),
            Some(BadgeEvent::Cleared)
        );
        assert_eq!(badge.extract(Some("Messenger"), &classifier), None);
    }

    #[test]
    fn test_transient_page_title_keeps_count() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        badge.extract(Some("(2) Messenger"), &classifier);
        assert_eq!(badge.extract(Some("Marketplace"), &classifier), None);
        assert_eq!(badge.state().last_raw_count.as_deref(), Some("2"));
        assert_eq!(badge.extract(Some("(2) Messenger"), &classifier), None);
    }

    #[test]
    fn test_zero_is_a_count() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        assert_eq!(
            badge.extract(Some("(0) Messenger"), &classifier),
            Some(BadgeEvent::CountChanged(0))
        );
        assert_eq!(badge.state().last_raw_count.as_deref(), Some("0"));
    }

    #[test]
    fn test_overflowing_count_saturates() {
        let classifier = KeywordClassifier::default();
        let mut badge = BadgeExtractor::new();

        assert_eq!(
            badge.extract(Some("(99999999999) Messenger"), &classifier),
            Some(BadgeEvent::CountChanged(u32::MAX))
        );
    }
}
