//! 投递接收端 trait 定义 - 由负责展示的 UI 层实现

use anyhow::Result;

use super::decision::{Delivery, SuppressReason};
use crate::call_detector::CallEndReason;

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Sent,
    /// 主动跳过（dry-run）
    Skipped(String),
    Failed(String),
}

/// 引擎决策的接收端。调用是 fire-and-forget：错误由分发器记录，
/// 不会传回引擎。
pub trait DeliverySink: Send + Sync {
    /// 接收端名称（用于日志）
    fn name(&self) -> &str;

    fn deliver_notification(&self, delivery: &Delivery) -> Result<()>;

    fn update_badge_count(&self, count: u32) -> Result<()>;

    fn prompt_incoming_call(&self, conversation_id: Option<&str>) -> Result<()>;

    /// 请求 DOM 协作方重新抓取
    fn request_rescrape(&self) -> Result<()>;

    /// 来电提示应当关闭
    fn call_ended(&self, _reason: CallEndReason) -> Result<()> {
        Ok(())
    }

    /// 候选通知被丢弃；只有诊断类接收端关心
    fn suppressed(&self, _reason: SuppressReason) -> Result<()> {
        Ok(())
    }
}
