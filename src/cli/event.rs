//! `msig replay` 和 `msig serve` 读取的输入事件行

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::actor::EngineInput;
use crate::engine::SignalEngine;
use crate::intake::{InterceptedNotification, ScrapedRow};
use crate::notification::Decision;
use crate::timer::Clock;

/// 一行 JSON 输入，例如
/// `{"type":"title","text":"(2) Messenger","atMs":1500}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// 相对回放开始的偏移（毫秒）；实时模式下忽略
    #[serde(default, rename = "atMs", skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<u64>,
    #[serde(flatten)]
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundKind {
    Title {
        #[serde(default)]
        text: Option<String>,
    },
    Notification(InterceptedNotification),
    ScrapedRow(ScrapedRow),
    ScriptMessage {
        handler: String,
        body: Value,
    },
    AcceptCall,
    DismissCall,
    SetSenderFilter {
        enabled: bool,
    },
    /// 只推进回放时钟
    Tick,
}

impl InboundEvent {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn at(&self) -> Option<Duration> {
        self.at_ms.map(Duration::from_millis)
    }
}

impl InboundKind {
    /// 在调用方持有的引擎上执行
    pub fn apply<C: Clock>(self, engine: &mut SignalEngine<C>) -> Vec<Decision> {
        match self {
            InboundKind::Title { text } => engine.on_title_changed(text.as_deref()),
            InboundKind::Notification(notification) => {
                engine.on_intercepted_notification(notification)
            }
            InboundKind::ScrapedRow(row) => engine.on_scraped_row(row),
            InboundKind::ScriptMessage { handler, body } => {
                engine.on_script_message(&handler, &body)
            }
            InboundKind::AcceptCall => engine.accept_call(),
            InboundKind::DismissCall => engine.dismiss_call(),
            InboundKind::SetSenderFilter { enabled } => engine.set_sender_filter(enabled),
            InboundKind::Tick => engine.tick(),
        }
    }

    /// 转换为发给后台引擎的消息；仅回放用的事件返回 `None`
    pub fn into_input(self) -> Option<EngineInput> {
        let input = match self {
            InboundKind::Title { text } => EngineInput::TitleChanged(text),
            InboundKind::Notification(notification) => {
                EngineInput::InterceptedNotification(notification)
            }
            InboundKind::ScrapedRow(row) => EngineInput::ScrapedRow(row),
            InboundKind::ScriptMessage { handler, body } => {
                EngineInput::ScriptMessage { handler, body }
            }
            InboundKind::AcceptCall => EngineInput::AcceptCall,
            InboundKind::DismissCall => EngineInput::DismissCall,
            InboundKind::SetSenderFilter { enabled } => EngineInput::SetSenderFilter(enabled),
            InboundKind::Tick => return None,
        };
        Some(input)
    }
}
