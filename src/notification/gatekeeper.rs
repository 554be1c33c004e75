//! 通知守门人 - 已分类信号通往接收端的唯一路径
//!
//! ## 候选通知的处理顺序
//! 1. 内部 tag（`read` 清除延迟的角标，`fallback` 去掉会话 ID）
//! 2. 发送者过滤
//! 3. 延迟角标对账
//! 4. 单槽去重
//!
//! 来电类候选不会走到这里：引擎把它们交给来电检测器，
//! 只请守门人批准来电提示。

use tracing::{debug, info};

use super::decision::{is_internal_tag, Decision, Delivery, SuppressReason, FALLBACK_TAG, READ_TAG};
use super::deduplicator::DedupWindow;
use crate::badge::{BadgeEvent, BadgeState};
use crate::classifier::{RowBody, SignalClassifier};
use crate::config::SignalConfig;
use crate::error::SignalError;
use crate::intake::{RawSignal, SignalPayload};

/// 等待裁决的候选通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub body: String,
    pub conversation_id: Option<String>,
}

impl Candidate {
    /// 将通知或抓取行信号整理成候选通知
    ///
    /// 抓取行映射到哨兵 tag：已读行和用户自己发的最后一条消息变为 `read`，
    /// 没有 ID 的行变为 `fallback`。状态行不含消息，直接拒绝。
    pub fn from_signal(
        signal: &RawSignal,
        classifier: &dyn SignalClassifier,
    ) -> Result<Self, SignalError> {
        match &signal.payload {
            SignalPayload::Notification { title, body, tag } => Ok(Self {
                title: title.clone(),
                body: body.clone(),
                conversation_id: tag.clone(),
            }),
            SignalPayload::ScrapedRow {
                sender,
                body,
                conversation_id,
                is_unread,
            } => {
                let conversation_id = match classifier.classify_row_body(body) {
                    RowBody::Status => {
                        return Err(SignalError::malformed(format!("status row: {}", body)))
                    }
                    RowBody::OwnMessage => READ_TAG.to_string(),
                    RowBody::Message if !is_unread => READ_TAG.to_string(),
                    RowBody::Message => conversation_id
                        .clone()
                        .unwrap_or_else(|| FALLBACK_TAG.to_string()),
                };
                Ok(Self {
                    title: sender.clone(),
                    body: body.clone(),
                    conversation_id: Some(conversation_id),
                })
            }
            SignalPayload::Title(_) => Err(SignalError::malformed("title is not a notification")),
        }
    }
}

pub struct Gatekeeper {
    dedup: DedupWindow,
    sender_filter_enabled: bool,
    notify_on_call: bool,
}

impl Gatekeeper {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            dedup: DedupWindow::new(),
            sender_filter_enabled: config.sender_filter_enabled,
            notify_on_call: config.notify_on_call,
        }
    }

    pub fn sender_filter_enabled(&self) -> bool {
        self.sender_filter_enabled
    }

    pub fn dedup(&self) -> &DedupWindow {
        &self.dedup
    }

    /// 切换发送者过滤；关闭时释放延迟的角标
    pub fn set_sender_filter(&mut self, enabled: bool, badge: &mut BadgeState) -> Vec<Decision> {
        self.sender_filter_enabled = enabled;
        info!(enabled, "Sender filter toggled");
        if enabled {
            return Vec::new();
        }
        match badge.pending_count.take() {
            Some(count) => {
                badge.last_unread_count = count;
                vec![Decision::UpdateBadge { count }]
            }
            None => Vec::new(),
        }
    }

    pub fn on_candidate(
        &mut self,
        candidate: Candidate,
        badge: &mut BadgeState,
        classifier: &dyn SignalClassifier,
        active_call: Option<&str>,
    ) -> Vec<Decision> {
        if candidate.conversation_id.as_deref() == Some(READ_TAG) {
            if let Some(count) = badge.pending_count.take() {
                debug!(count, "Read conversation, dropping deferred badge");
            }
            return vec![Decision::suppress(SuppressReason::ReadConversation)];
        }

        if self.sender_filter_enabled && classifier.is_blocked_sender(&candidate.title) {
            if let Some(count) = badge.pending_count.take() {
                debug!(count, "Deferred badge belongs to filtered sender, dropping");
            }
            info!(title = %candidate.title, "Filtered out blocked sender");
            return vec![Decision::suppress(SuppressReason::BlockedSender)];
        }

        let mut decisions = Vec::new();
        if let Some(count) = badge.pending_count.take() {
            debug!(count, sender = %candidate.title, "Sender verified, applying deferred badge");
            badge.last_unread_count = count;
            decisions.push(Decision::UpdateBadge { count });
        }

        if !self.dedup.should_deliver(&candidate.title, &candidate.body) {
            decisions.push(Decision::suppress(SuppressReason::Duplicate));
            return decisions;
        }

        let conversation_id = candidate
            .conversation_id
            .filter(|id| !is_internal_tag(id));
        let is_call = match (active_call, conversation_id.as_deref()) {
            (Some(active), Some(id)) => active == id,
            _ => false,
        };
        decisions.push(Decision::Deliver(Delivery {
            title: candidate.title,
            body: candidate.body,
            conversation_id,
            is_call,
        }));
        decisions
    }

    /// 处理角标事件。`CountChanged` 的重新抓取由调用方调度，
    /// 这里只决定哪些内容可见。
    pub fn on_badge_event(&mut self, event: BadgeEvent, badge: &mut BadgeState) -> Vec<Decision> {
        match event {
            BadgeEvent::Cleared => {
                badge.pending_count = None;
                badge.last_unread_count = 0;
                self.dedup.reset();
                vec![Decision::UpdateBadge { count: 0 }]
            }
            BadgeEvent::CountChanged(count) if count == 0 || !self.sender_filter_enabled => {
                if let Some(stale) = badge.pending_count.take() {
                    debug!(error = %SignalError::StaleState(stale), "Replacing deferred badge");
                }
                if count > badge.last_unread_count {
                    debug!(from = badge.last_unread_count, to = count, "Unread count increased");
                }
                badge.last_unread_count = count;
                vec![Decision::UpdateBadge { count }]
            }
            BadgeEvent::CountChanged(count) => {
                if let Some(stale) = badge.pending_count.replace(count) {
                    debug!(error = %SignalError::StaleState(stale), "Replacing deferred badge");
                }
                debug!(count, "Badge deferred until sender is verified");
                Vec::new()
            }
        }
    }

    /// 批准新检测到的来电提示。`notification` 是触发它的拦截通知（如有）。
    pub fn authorize_call_prompt(
        &self,
        conversation_id: Option<String>,
        notification: Option<Candidate>,
    ) -> Vec<Decision> {
        let conversation_id = conversation_id.filter(|id| !is_internal_tag(id));
        let mut decisions = vec![Decision::ShowCallPrompt {
            conversation_id: conversation_id.clone(),
        }];

        if self.notify_on_call {
            if let Some(candidate) = notification {
                decisions.push(Decision::Deliver(Delivery {
                    title: candidate.title,
                    body: candidate.body,
                    conversation_id,
                    is_call: true,
                }));
            }
        }
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use crate::intake::{ScrapedRow, SignalIntake};
    use std::time::Instant;

    fn candidate(title: &str, body: &str, id: Option<&str>) -> Candidate {
        Candidate {
            title: title.to_string(),
            body: body.to_string(),
            conversation_id: id.map(str::to_string),
        }
    }

    fn filtered() -> Gatekeeper {
        Gatekeeper::new(&SignalConfig::default().with_sender_filter(true))
    }

    #[test]
    fn test_duplicate_candidate_delivered_once() {
        let classifier = KeywordClassifier::default();
        let mut gate = Gatekeeper::new(&SignalConfig::default());
        let mut badge = BadgeState::default();

        let first = gate.on_candidate(candidate("Bob", "hey", None), &mut badge, &classifier, None);
        let second = gate.on_candidate(candidate("Bob", "hey", None), &mut badge, &classifier, None);

        assert!(matches!(first.as_slice(), [Decision::Deliver(_)]));
        assert_eq!(second, vec![Decision::suppress(SuppressReason::Duplicate)]);
    }

    #[test]
    fn test_deferred_badge_applied_by_passing_notification() {
        let classifier = KeywordClassifier::default();
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        assert!(gate
            .on_badge_event(BadgeEvent::CountChanged(2), &mut badge)
            .is_empty());
        assert_eq!(badge.pending_count, Some(2));
        assert_eq!(badge.last_unread_count, 0);

        let decisions =
            gate.on_candidate(candidate("Bob", "hey", Some("42")), &mut badge, &classifier, None);
        assert_eq!(decisions[0], Decision::UpdateBadge { count: 2 });
        assert!(matches!(&decisions[1], Decision::Deliver(d) if d.conversation_id.as_deref() == Some("42")));
        assert_eq!(badge.pending_count, None);
        assert_eq!(badge.last_unread_count, 2);
    }

    #[test]
    fn test_blocked_sender_drops_deferred_badge() {
        let classifier = KeywordClassifier::default();
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        gate.on_badge_event(BadgeEvent::CountChanged(2), &mut badge);
        let decisions = gate.on_candidate(
            candidate("Messenger", "New message", None),
            &mut badge,
            &classifier,
            None,
        );
        assert_eq!(decisions, vec![Decision::suppress(SuppressReason::BlockedSender)]);
        assert_eq!(badge.pending_count, None);
    }

    #[test]
    fn test_blocked_sender_ignored_without_filter() {
        let classifier = KeywordClassifier::default();
        let mut gate = Gatekeeper::new(&SignalConfig::default());
        let mut badge = BadgeState::default();

        let decisions = gate.on_candidate(
            candidate("Messenger", "New message", None),
            &mut badge,
            &classifier,
            None,
        );
        assert!(matches!(decisions.as_slice(), [Decision::Deliver(_)]));
    }

    #[test]
    fn test_read_tag_clears_pending_without_delivery() {
        let classifier = KeywordClassifier::default();
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        gate.on_badge_event(BadgeEvent::CountChanged(1), &mut badge);
        let decisions =
            gate.on_candidate(candidate("Bob", "hey", Some(READ_TAG)), &mut badge, &classifier, None);
        assert_eq!(decisions, vec![Decision::suppress(SuppressReason::ReadConversation)]);
        assert_eq!(badge.pending_count, None);
        assert_eq!(gate.dedup().last_delivered_key(), None);
    }

    #[test]
    fn test_fallback_tag_is_not_a_conversation() {
        let classifier = KeywordClassifier::default();
        let mut gate = Gatekeeper::new(&SignalConfig::default());
        let mut badge = BadgeState::default();

        let decisions = gate.on_candidate(
            candidate("Bob", "hey", Some(FALLBACK_TAG)),
            &mut badge,
            &classifier,
            None,
        );
        match decisions.as_slice() {
            [Decision::Deliver(delivery)] => assert_eq!(delivery.conversation_id, None),
            other => panic!("unexpected decisions: {:?}", other),
        }
    }

    #[test]
    fn test_zero_count_applies_immediately_even_with_filter() {
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        gate.on_badge_event(BadgeEvent::CountChanged(3), &mut badge);
        let decisions = gate.on_badge_event(BadgeEvent::CountChanged(0), &mut badge);
        assert_eq!(decisions, vec![Decision::UpdateBadge { count: 0 }]);
        assert_eq!(badge.pending_count, None);
    }

    #[test]
    fn test_cleared_resets_dedup_and_pending() {
        let classifier = KeywordClassifier::default();
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        gate.on_candidate(candidate("Bob", "hey", None), &mut badge, &classifier, None);
        gate.on_badge_event(BadgeEvent::CountChanged(4), &mut badge);

        let decisions = gate.on_badge_event(BadgeEvent::Cleared, &mut badge);
        assert_eq!(decisions, vec![Decision::UpdateBadge { count: 0 }]);
        assert_eq!(badge.pending_count, None);
        assert_eq!(gate.dedup().last_delivered_key(), None);
    }

    #[test]
    fn test_disabling_filter_releases_pending() {
        let mut gate = filtered();
        let mut badge = BadgeState::default();

        gate.on_badge_event(BadgeEvent::CountChanged(5), &mut badge);
        assert_eq!(
            gate.set_sender_filter(false, &mut badge),
            vec![Decision::UpdateBadge { count: 5 }]
        );
        assert!(!gate.sender_filter_enabled());
        assert!(gate.set_sender_filter(false, &mut badge).is_empty());
    }

    #[test]
    fn test_candidate_in_active_call_conversation() {
        let classifier = KeywordClassifier::default();
        let mut gate = Gatekeeper::new(&SignalConfig::default());
        let mut badge = BadgeState::default();

        let decisions = gate.on_candidate(
            candidate("Alice", "pick up!", Some("c1")),
            &mut badge,
            &classifier,
            Some("c1"),
        );
        assert!(matches!(&decisions[0], Decision::Deliver(d) if d.is_call));
    }

    #[test]
    fn test_call_prompt_with_notification() {
        let gate = Gatekeeper::new(&SignalConfig::default());
        let decisions = gate.authorize_call_prompt(
            Some("c1".to_string()),
            Some(candidate("Alice is calling", "", Some("c1"))),
        );
        assert_eq!(
            decisions[0],
            Decision::ShowCallPrompt {
                conversation_id: Some("c1".to_string())
            }
        );
        assert!(matches!(&decisions[1], Decision::Deliver(d) if d.is_call));

        let quiet = Gatekeeper::new(&SignalConfig {
            notify_on_call: false,
            ..SignalConfig::default()
        });
        assert_eq!(quiet.authorize_call_prompt(None, None).len(), 1);
    }

    #[test]
    fn test_candidate_from_scraped_rows() {
        let classifier = KeywordClassifier::default();
        let mut intake = SignalIntake::new();
        let now = Instant::now();

        let unread = intake.scraped_row(ScrapedRow::unread("Bob", "hey"), now).unwrap();
        assert_eq!(
            Candidate::from_signal(&unread, &classifier).unwrap().conversation_id.as_deref(),
            Some(FALLBACK_TAG)
        );

        let read = intake
            .scraped_row(ScrapedRow::unread("Bob", "hey").with_conversation_id("9").read(), now)
            .unwrap();
        assert_eq!(
            Candidate::from_signal(&read, &classifier).unwrap().conversation_id.as_deref(),
            Some(READ_TAG)
        );

        let own = intake.scraped_row(ScrapedRow::unread("Bob", "You: bye"), now).unwrap();
        assert_eq!(
            Candidate::from_signal(&own, &classifier).unwrap().conversation_id.as_deref(),
            Some(READ_TAG)
        );

        let status = intake.scraped_row(ScrapedRow::unread("Bob", "Active now"), now).unwrap();
        assert!(Candidate::from_signal(&status, &classifier).is_err());

        let title = intake.title(Some("Messenger"), now);
        assert!(Candidate::from_signal(&title, &classifier).is_err());
    }
}
