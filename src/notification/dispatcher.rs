//! 决策分发器 - 将引擎决策路由到所有已注册的接收端

use super::channel::{DeliverySink, SendResult};
use super::decision::Decision;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DecisionDispatcher {
    sinks: Vec<Arc<dyn DeliverySink>>,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl DecisionDispatcher {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.register_sink(sink);
        self
    }

    pub fn register_sink(&mut self, sink: Arc<dyn DeliverySink>) {
        info!(sink = sink.name(), "Registering delivery sink");
        self.sinks.push(sink);
    }

    /// 同步发送决策到所有接收端；失败只记录日志，不返回错误
    pub fn dispatch(&self, decision: &Decision) -> Vec<(String, SendResult)> {
        if let Decision::Suppress { reason } = decision {
            debug!(reason = %reason, "Decision suppressed");
        }

        let mut results = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let name = sink.name().to_string();

            if self.dry_run {
                debug!(sink = %name, decision = ?decision, "[DRY-RUN] Would dispatch");
                results.push((name, SendResult::Skipped("dry-run".to_string())));
                continue;
            }

            let result = match send_to(sink.as_ref(), decision) {
                Ok(()) => SendResult::Sent,
                Err(e) => {
                    warn!(sink = %name, error = %e, "Sink failed to handle decision");
                    SendResult::Failed(e.to_string())
                }
            };
            results.push((name, result));
        }
        results
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl Default for DecisionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn send_to(sink: &dyn DeliverySink, decision: &Decision) -> Result<()> {
    match decision {
        Decision::Deliver(delivery) => sink.deliver_notification(delivery),
        Decision::Suppress { reason } => sink.suppressed(*reason),
        Decision::ShowCallPrompt { conversation_id } => {
            sink.prompt_incoming_call(conversation_id.as_deref())
        }
        Decision::UpdateBadge { count } => sink.update_badge_count(*count),
        Decision::RequestRescrape => sink.request_rescrape(),
        Decision::CallEnded { reason } => sink.call_ended(*reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channels::RecordingSink;
    use crate::notification::decision::{Delivery, SuppressReason};
    use anyhow::anyhow;

    struct FailingSink;

    impl DeliverySink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn deliver_notification(&self, _delivery: &Delivery) -> Result<()> {
            Err(anyhow!("notification center unavailable"))
        }

        fn update_badge_count(&self, _count: u32) -> Result<()> {
            Err(anyhow!("dock unavailable"))
        }

        fn prompt_incoming_call(&self, _conversation_id: Option<&str>) -> Result<()> {
            Ok(())
        }

        fn request_rescrape(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_sink() {
        let mut dispatcher = DecisionDispatcher::new();
        assert_eq!(dispatcher.sink_count(), 0);

        dispatcher.register_sink(Arc::new(RecordingSink::new()));
        assert_eq!(dispatcher.sink_count(), 1);
        assert_eq!(dispatcher.sink_names(), vec!["recording"]);
    }

    #[test]
    fn test_dispatch_routes_by_decision() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = DecisionDispatcher::new().with_sink(sink.clone());

        dispatcher.dispatch(&Decision::UpdateBadge { count: 3 });
        dispatcher.dispatch(&Decision::RequestRescrape);
        dispatcher.dispatch(&Decision::suppress(SuppressReason::Duplicate));

        assert_eq!(
            sink.decisions(),
            vec![
                Decision::UpdateBadge { count: 3 },
                Decision::RequestRescrape,
                Decision::suppress(SuppressReason::Duplicate),
            ]
        );
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = DecisionDispatcher::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(sink.clone());

        let results = dispatcher.dispatch(&Decision::UpdateBadge { count: 1 });
        assert!(matches!(results[0].1, SendResult::Failed(_)));
        assert_eq!(results[1].1, SendResult::Sent);
        assert_eq!(sink.badge_updates(), vec![1]);
    }

    #[test]
    fn test_dry_run() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = DecisionDispatcher::new()
            .with_dry_run(true)
            .with_sink(sink.clone());

        let results = dispatcher.dispatch(&Decision::UpdateBadge { count: 1 });
        assert_eq!(results[0].1, SendResult::Skipped("dry-run".to_string()));
        assert!(sink.decisions().is_empty());
    }
}
