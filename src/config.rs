//! Configuration - keyword lists, sender filter and timer windows
//!
//! Lookup order for [`SignalConfig::load`]:
//! 1. Explicit path argument
//! 2. Environment variable `MSIG_CONFIG`
//! 3. `<config_dir>/messenger-signal/config.json`
//! 4. Built-in defaults
//!
//! Missing keys fall back to their defaults, so a config file only needs the
//! fields it wants to override.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "MSIG_CONFIG";

/// Silence window after which a title-detected call is assumed over
pub const DEFAULT_CALL_SILENCE_MS: u64 = 30_000;

/// Hard expiry for a call registered through a notification
pub const DEFAULT_CALL_EXPIRY_MS: u64 = 60_000;

/// Delay between a badge change and the DOM re-scrape request
pub const DEFAULT_RESCRAPE_DELAY_MS: u64 = 1_000;

/// Deep-link prefix for a conversation id
pub const DEFAULT_CONVERSATION_URL_BASE: &str = "https://www.messenger.com/t/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignalConfig {
    /// Localized phrases that mark an incoming call
    pub call_keywords: Vec<String>,
    /// Localized "is typing" phrases shown in the title
    pub typing_phrases: Vec<String>,
    /// Scraped row bodies that are presence/status text, not messages
    pub status_phrases: Vec<String>,
    /// Scraped row body prefixes marking the user's own last message
    pub skip_prefixes: Vec<String>,
    /// Sender names suppressed when the sender filter is on
    pub blocked_senders: Vec<String>,
    /// Titles of the idle app page; only these clear the badge. Empty means
    /// any unrecognized title does.
    pub home_titles: Vec<String>,
    pub sender_filter_enabled: bool,
    /// Also show a system notification when a call arrives by notification
    pub notify_on_call: bool,
    pub call_silence_ms: u64,
    pub call_expiry_ms: u64,
    pub rescrape_delay_ms: u64,
    pub conversation_url_base: String,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            call_keywords: strings(&[
                "is calling",
                "incoming call",
                "volá",
                "příchozí hovor",
                "ruft an",
                "te está llamando",
                "vous appelle",
            ]),
            typing_phrases: strings(&[
                "is typing",
                "typing…",
                "typing...",
                "píše",
                "schreibt",
                "escribiendo",
                "écrit",
            ]),
            status_phrases: strings(&[
                "Active now",
                "Aktivní",
                "Message unavailable",
                "Zpráva není k dispozici",
            ]),
            skip_prefixes: strings(&["You:", "Vy:", "Du:", "Tú:", "Vous :"]),
            blocked_senders: strings(&["Messenger"]),
            home_titles: strings(&["Messenger"]),
            sender_filter_enabled: false,
            notify_on_call: true,
            call_silence_ms: DEFAULT_CALL_SILENCE_MS,
            call_expiry_ms: DEFAULT_CALL_EXPIRY_MS,
            rescrape_delay_ms: DEFAULT_RESCRAPE_DELAY_MS,
            conversation_url_base: DEFAULT_CONVERSATION_URL_BASE.to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SignalConfig {
    /// Load configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }

        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config JSON in {}", path.display()))?;
        info!(path = %path.display(), "Loaded signal config");
        Ok(config)
    }

    /// `<config_dir>/messenger-signal/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("messenger-signal").join("config.json"))
    }

    pub fn with_sender_filter(mut self, enabled: bool) -> Self {
        self.sender_filter_enabled = enabled;
        self
    }

    pub fn call_silence(&self) -> Duration {
        Duration::from_millis(self.call_silence_ms)
    }

    pub fn call_expiry(&self) -> Duration {
        Duration::from_millis(self.call_expiry_ms)
    }

    pub fn rescrape_delay(&self) -> Duration {
        Duration::from_millis(self.rescrape_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let config = SignalConfig::default();
        assert_eq!(config.call_silence(), Duration::from_secs(30));
        assert_eq!(config.call_expiry(), Duration::from_secs(60));
        assert_eq!(config.rescrape_delay(), Duration::from_secs(1));
        assert!(!config.sender_filter_enabled);
        assert_eq!(config.blocked_senders, vec!["Messenger".to_string()]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SignalConfig =
            serde_json::from_str(r#"{"senderFilterEnabled": true, "callKeywords": ["ringing"]}"#)
                .unwrap();
        assert!(config.sender_filter_enabled);
        assert_eq!(config.call_keywords, vec!["ringing".to_string()]);
        assert_eq!(config.call_expiry_ms, DEFAULT_CALL_EXPIRY_MS);
        assert!(!config.typing_phrases.is_empty());
    }

    #[test]
    fn test_home_titles_default_to_app_name() {
        let config: SignalConfig = serde_json::from_str(r#"{"homeTitles": []}"#).unwrap();
        assert!(config.home_titles.is_empty());
        assert_eq!(
            SignalConfig::default().home_titles,
            vec!["Messenger".to_string()]
        );
    }

    #[test]
    fn test_with_sender_filter() {
        let config = SignalConfig::default().with_sender_filter(true);
        assert!(config.sender_filter_enabled);
    }
}
