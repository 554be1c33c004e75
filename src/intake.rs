//! Signal intake - adapts the three page channels into one [`RawSignal`] type
//!
//! Nothing here filters or classifies. Each channel keeps its own arrival
//! counter so per-channel order survives; channels are not interleaved into a
//! global order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::error::SignalError;

/// Script message handler used by the injected `Notification` override
pub const NOTIFICATION_HANDLER: &str = "notificationHandler";

/// Script message handler used by the DOM scraper
pub const SCRAPE_HANDLER: &str = "scrapeHandler";

/// A call to the page's `Notification` constructor, as posted by the
/// injected script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedNotification {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl InterceptedNotification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// One conversation row read out of the sidebar DOM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedRow {
    pub sender: String,
    pub body: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default = "default_unread")]
    pub is_unread: bool,
}

fn default_unread() -> bool {
    true
}

impl ScrapedRow {
    pub fn unread(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            conversation_id: None,
            is_unread: true,
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn read(mut self) -> Self {
        self.is_unread = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    TitleText,
    InterceptedNotification,
    ScrapedRow,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::TitleText => "title",
            SignalSource::InterceptedNotification => "notification",
            SignalSource::ScrapedRow => "scrape",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    /// `None` means the title was cleared or the app went to background
    Title(Option<String>),
    Notification {
        title: String,
        body: String,
        tag: Option<String>,
    },
    ScrapedRow {
        sender: String,
        body: String,
        conversation_id: Option<String>,
        is_unread: bool,
    },
}

/// Normalized page signal, consumed exactly once by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignal {
    pub payload: SignalPayload,
    pub received_at: Instant,
    /// Arrival order within the signal's own channel
    pub seq: u64,
}

impl RawSignal {
    pub fn source(&self) -> SignalSource {
        match self.payload {
            SignalPayload::Title(_) => SignalSource::TitleText,
            SignalPayload::Notification { .. } => SignalSource::InterceptedNotification,
            SignalPayload::ScrapedRow { .. } => SignalSource::ScrapedRow,
        }
    }

    /// Title and body joined by a space; what keyword matching looks at
    pub fn combined_text(&self) -> String {
        match &self.payload {
            SignalPayload::Title(text) => text.clone().unwrap_or_default(),
            SignalPayload::Notification { title, body, .. } => join_text(title, body),
            SignalPayload::ScrapedRow { sender, body, .. } => join_text(sender, body),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match &self.payload {
            SignalPayload::Title(_) => None,
            SignalPayload::Notification { tag, .. } => tag.as_deref(),
            SignalPayload::ScrapedRow {
                conversation_id, ..
            } => conversation_id.as_deref(),
        }
    }
}

fn join_text(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}

/// Per-channel arrival counters
#[derive(Debug, Default)]
pub struct SignalIntake {
    title_seq: u64,
    notification_seq: u64,
    scrape_seq: u64,
}

impl SignalIntake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, text: Option<&str>, at: Instant) -> RawSignal {
        self.title_seq += 1;
        RawSignal {
            payload: SignalPayload::Title(text.map(str::to_string)),
            received_at: at,
            seq: self.title_seq,
        }
    }

    pub fn intercepted(
        &mut self,
        notification: InterceptedNotification,
        at: Instant,
    ) -> Result<RawSignal, SignalError> {
        let title = notification.title.trim();
        if title.is_empty() {
            return Err(SignalError::malformed("notification without title"));
        }

        // The page script posts '' when the notification has no tag
        let tag = notification
            .tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        self.notification_seq += 1;
        Ok(RawSignal {
            payload: SignalPayload::Notification {
                title: title.to_string(),
                body: notification.body.trim().to_string(),
                tag,
            },
            received_at: at,
            seq: self.notification_seq,
        })
    }

    pub fn scraped_row(&mut self, row: ScrapedRow, at: Instant) -> Result<RawSignal, SignalError> {
        let sender = row.sender.trim();
        let body = row.body.trim();
        if sender.is_empty() || body.is_empty() {
            return Err(SignalError::malformed("scraped row without sender or body"));
        }

        let conversation_id = row
            .conversation_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        self.scrape_seq += 1;
        Ok(RawSignal {
            payload: SignalPayload::ScrapedRow {
                sender: sender.to_string(),
                body: body.to_string(),
                conversation_id,
                is_unread: row.is_unread,
            },
            received_at: at,
            seq: self.scrape_seq,
        })
    }

    /// Decode a raw script message posted by the page
    ///
    /// `notificationHandler` carries `{title, body?, tag?}`; `scrapeHandler`
    /// carries `{rows: [...]}` or `{error: "no_container"}`.
    pub fn parse_script_message(
        &mut self,
        handler: &str,
        body: &Value,
        at: Instant,
    ) -> Result<Vec<RawSignal>, SignalError> {
        match handler {
            NOTIFICATION_HANDLER => {
                let notification: InterceptedNotification =
                    serde_json::from_value(body.clone())
                        .map_err(|e| SignalError::malformed(e.to_string()))?;
                Ok(vec![self.intercepted(notification, at)?])
            }
            SCRAPE_HANDLER => {
                if body.get("error").is_some() {
                    return Err(SignalError::UnrecognizedPageStructure);
                }
                let rows = body
                    .get("rows")
                    .and_then(Value::as_array)
                    .ok_or(SignalError::UnrecognizedPageStructure)?;
                if rows.is_empty() {
                    return Err(SignalError::UnrecognizedPageStructure);
                }

                let mut signals = Vec::with_capacity(rows.len());
                for raw in rows {
                    let row: ScrapedRow = match serde_json::from_value(raw.clone()) {
                        Ok(row) => row,
                        Err(_) => continue,
                    };
                    if let Ok(signal) = self.scraped_row(row, at) {
                        signals.push(signal);
                    }
                }
                if signals.is_empty() {
                    return Err(SignalError::malformed("no usable scraped rows"));
                }
                Ok(signals)
            }
            other => Err(SignalError::malformed(format!(
                "unknown script handler: {}",
                other
            ))),
        }
    }
}
