//! 通知去重器 - 单槽去重
//!
//! 外部推送会触发页面重新抓取，而重新抓取会再次读到刚投递过的消息。
//! 只记住最后一条已投递的 `title|body` 就足以吞掉这种回声。
//! 两个会话文本完全相同时也会被合并，这是可接受的。

use tracing::debug;

/// 去重 key：`title|body`
pub fn dedup_key(title: &str, body: &str) -> String {
    format!("{}|{}", title, body)
}

#[derive(Debug, Default)]
pub struct DedupWindow {
    last_delivered_key: Option<String>,
}

impl DedupWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 检查是否应该投递通知
    ///
    /// 返回 `true` 表示应该投递（并记住该 key），`false` 表示去重跳过
    pub fn should_deliver(&mut self, title: &str, body: &str) -> bool {
        let key = dedup_key(title, body);
        if self.last_delivered_key.as_deref() == Some(key.as_str()) {
            debug!(key = %key, "Notification deduplicated (same as last delivered)");
            return false;
        }
        self.last_delivered_key = Some(key);
        true
    }

    /// 清空记录（例如全部已读之后）
    pub fn reset(&mut self) {
        self.last_delivered_key = None;
    }

    pub fn last_delivered_key(&self) -> Option<&str> {
        self.last_delivered_key.as_deref()
    }
}
