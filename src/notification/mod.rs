//! 通知层 - 守门、去重与投递
//!
//! # 设计
//! 1. `Gatekeeper` 是决定什么能到达接收端的唯一权威
//! 2. `DedupWindow` 只记住最后一条已投递的消息
//! 3. `DeliverySink` 由 UI 层实现，核心本身从不展示任何东西
//! 4. `DecisionDispatcher` 把决策分发给所有已注册的接收端
//!
//! # 示例
//! ```ignore
//! use messenger_signal::notification::{DecisionDispatcher, RecordingSink};
//!
//! let sink = Arc::new(RecordingSink::new());
//! let dispatcher = DecisionDispatcher::new().with_sink(sink.clone());
//! dispatcher.dispatch(&Decision::UpdateBadge { count: 3 });
//! ```

pub mod channel;
pub mod channels;
pub mod decision;
pub mod deduplicator;
pub mod dispatcher;
pub mod gatekeeper;

pub use channel::{DeliverySink, SendResult};
pub use channels::{DecisionRecord, JsonLinesSink, RecordingSink};
pub use decision::{
    conversation_url, is_internal_tag, Decision, Delivery, SuppressReason, FALLBACK_TAG, READ_TAG,
};
pub use deduplicator::{dedup_key, DedupWindow};
pub use dispatcher::DecisionDispatcher;
pub use gatekeeper::{Candidate, Gatekeeper};
