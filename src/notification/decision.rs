//! 引擎输出给投递接收端的决策

use serde::{Deserialize, Serialize};

use crate::call_detector::CallEndReason;

/// 页面用来标记已读会话的 tag
pub const READ_TAG: &str = "read";

/// 没有真实会话 ID 的抓取行使用的 tag
pub const FALLBACK_TAG: &str = "fallback";

/// 内部哨兵 tag 不对应任何真实会话
pub fn is_internal_tag(tag: &str) -> bool {
    tag == READ_TAG || tag == FALLBACK_TAG
}

/// 会话深链接，哨兵 tag 返回 `None`
pub fn conversation_url(base: &str, conversation_id: &str) -> Option<String> {
    let id = conversation_id.trim();
    if id.is_empty() || is_internal_tag(id) {
        return None;
    }
    Some(format!("{}{}", base, id))
}

/// 允许展示的系统通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub title: String,
    pub body: String,
    pub conversation_id: Option<String>,
    pub is_call: bool,
}

impl Delivery {
    pub fn deep_link(&self, base: &str) -> Option<String> {
        self.conversation_id
            .as_deref()
            .and_then(|id| conversation_url(base, id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// 页面已将会话标记为已读
    ReadConversation,
    /// 发送者过滤命中标题
    BlockedSender,
    /// 与上一条已投递通知的 `title|body` 相同
    Duplicate,
    /// 用户已接听或拒绝的来电
    CallMuted,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::ReadConversation => "read_conversation",
            SuppressReason::BlockedSender => "blocked_sender",
            SuppressReason::Duplicate => "duplicate",
            SuppressReason::CallMuted => "call_muted",
        }
    }
}

impl std::fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    Deliver(Delivery),
    Suppress { reason: SuppressReason },
    ShowCallPrompt { conversation_id: Option<String> },
    UpdateBadge { count: u32 },
    RequestRescrape,
    CallEnded { reason: CallEndReason },
}

impl Decision {
    pub fn suppress(reason: SuppressReason) -> Self {
        Decision::Suppress { reason }
    }

    /// 接收端是否能看到该决策
    pub fn is_visible(&self) -> bool {
        !matches!(self, Decision::Suppress { .. })
    }
}
