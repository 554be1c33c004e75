//! JSON-lines 接收端 - 每个决策写一行记录，供 `msig` CLI 使用

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

use crate::call_detector::CallEndReason;
use crate::notification::channel::DeliverySink;
use crate::notification::decision::{Decision, Delivery, SuppressReason};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub decision: Decision,
    /// 带真实会话 ID 的投递对应的深链接
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
    conversation_url_base: String,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>, conversation_url_base: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            conversation_url_base: conversation_url_base.into(),
        }
    }

    pub fn stdout(conversation_url_base: impl Into<String>) -> Self {
        Self::new(Box::new(std::io::stdout()), conversation_url_base)
    }

    fn write(&self, decision: Decision) -> Result<()> {
        let url = match &decision {
            Decision::Deliver(delivery) => delivery.deep_link(&self.conversation_url_base),
            _ => None,
        };
        let record = DecisionRecord {
            ts: Utc::now(),
            decision,
            url,
        };
        let line = serde_json::to_string(&record).context("Failed to encode decision")?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("json-lines writer lock poisoned"))?;
        writeln!(writer, "{}", line).context("Failed to write decision")?;
        writer.flush().context("Failed to flush decision")?;
        Ok(())
    }
}

impl DeliverySink for JsonLinesSink {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn deliver_notification(&self, delivery: &Delivery) -> Result<()> {
        self.write(Decision::Deliver(delivery.clone()))
    }

    fn update_badge_count(&self, count: u32) -> Result<()> {
        self.write(Decision::UpdateBadge { count })
    }

    fn prompt_incoming_call(&self, conversation_id: Option<&str>) -> Result<()> {
        self.write(Decision::ShowCallPrompt {
            conversation_id: conversation_id.map(str::to_string),
        })
    }

    fn request_rescrape(&self) -> Result<()> {
        self.write(Decision::RequestRescrape)
    }

    fn call_ended(&self, reason: CallEndReason) -> Result<()> {
        self.write(Decision::CallEnded { reason })
    }

    fn suppressed(&self, reason: SuppressReason) -> Result<()> {
        self.write(Decision::Suppress { reason })
    }
}
