//! 内存接收端 - 记录收到的每个决策

use anyhow::{anyhow, Result};
use std::sync::Mutex;

use crate::call_detector::CallEndReason;
use crate::notification::channel::DeliverySink;
use crate::notification::decision::{Decision, Delivery, SuppressReason};

#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Decision>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, decision: Decision) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?
            .push(decision);
        Ok(())
    }

    /// 目前记录的全部决策（按顺序）
    pub fn decisions(&self) -> Vec<Decision> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.decisions()
            .into_iter()
            .filter_map(|d| match d {
                Decision::Deliver(delivery) => Some(delivery),
                _ => None,
            })
            .collect()
    }

    pub fn badge_updates(&self) -> Vec<u32> {
        self.decisions()
            .into_iter()
            .filter_map(|d| match d {
                Decision::UpdateBadge { count } => Some(count),
                _ => None,
            })
            .collect()
    }

    pub fn call_prompts(&self) -> Vec<Option<String>> {
        self.decisions()
            .into_iter()
            .filter_map(|d| match d {
                Decision::ShowCallPrompt { conversation_id } => Some(conversation_id),
                _ => None,
            })
            .collect()
    }

    pub fn rescrape_requests(&self) -> usize {
        self.decisions()
            .iter()
            .filter(|d| matches!(d, Decision::RequestRescrape))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl DeliverySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver_notification(&self, delivery: &Delivery) -> Result<()> {
        self.record(Decision::Deliver(delivery.clone()))
    }

    fn update_badge_count(&self, count: u32) -> Result<()> {
        self.record(Decision::UpdateBadge { count })
    }

    fn prompt_incoming_call(&self, conversation_id: Option<&str>) -> Result<()> {
        self.record(Decision::ShowCallPrompt {
            conversation_id: conversation_id.map(str::to_string),
        })
    }

    fn request_rescrape(&self) -> Result<()> {
        self.record(Decision::RequestRescrape)
    }

    fn call_ended(&self, reason: CallEndReason) -> Result<()> {
        self.record(Decision::CallEnded { reason })
    }

    fn suppressed(&self, reason: SuppressReason) -> Result<()> {
        self.record(Decision::Suppress { reason })
    }
}
