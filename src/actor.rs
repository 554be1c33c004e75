//! Engine actor - serializes producers from any task onto one engine
//!
//! Title observers, script-message handlers and scrape callbacks may run on
//! different tasks or threads. They only hold an [`EngineHandle`] and send
//! inputs; the engine itself lives on a single tokio task that also sleeps
//! until the next timer deadline.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::badge::BadgeState;
use crate::engine::SignalEngine;
use crate::intake::{InterceptedNotification, ScrapedRow};
use crate::timer::Clock;

/// Clock that follows tokio's time, including paused test time
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

#[derive(Debug)]
pub enum EngineInput {
    TitleChanged(Option<String>),
    InterceptedNotification(InterceptedNotification),
    ScrapedRow(ScrapedRow),
    ScriptMessage { handler: String, body: Value },
    AcceptCall,
    DismissCall,
    SetSenderFilter(bool),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Point-in-time view of the engine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub badge: BadgeState,
    pub has_active_call: bool,
    pub active_conversation: Option<String>,
    pub sender_filter_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl EngineHandle {
    pub fn send(&self, input: EngineInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|_| anyhow!("signal engine has stopped"))
    }

    pub fn title_changed(&self, text: Option<&str>) -> Result<()> {
        self.send(EngineInput::TitleChanged(text.map(str::to_string)))
    }

    pub fn intercepted_notification(&self, notification: InterceptedNotification) -> Result<()> {
        self.send(EngineInput::InterceptedNotification(notification))
    }

    pub fn scraped_row(&self, row: ScrapedRow) -> Result<()> {
        self.send(EngineInput::ScrapedRow(row))
    }

    pub fn script_message(&self, handler: impl Into<String>, body: Value) -> Result<()> {
        self.send(EngineInput::ScriptMessage {
            handler: handler.into(),
            body,
        })
    }

    pub fn accept_call(&self) -> Result<()> {
        self.send(EngineInput::AcceptCall)
    }

    pub fn dismiss_call(&self) -> Result<()> {
        self.send(EngineInput::DismissCall)
    }

    pub fn set_sender_filter(&self, enabled: bool) -> Result<()> {
        self.send(EngineInput::SetSenderFilter(enabled))
    }

    /// Waits until every input sent before it has been processed
    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineInput::Snapshot(reply))?;
        rx.await.map_err(|_| anyhow!("signal engine dropped snapshot request"))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineInput::Shutdown)
    }
}

/// Move the engine onto its own task
pub fn spawn_engine<C>(engine: SignalEngine<C>) -> (EngineHandle, JoinHandle<()>)
where
    C: Clock + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(engine, rx));
    (EngineHandle { tx }, task)
}

async fn run<C: Clock>(mut engine: SignalEngine<C>, mut rx: mpsc::UnboundedReceiver<EngineInput>) {
    info!("Signal engine started");

    loop {
        let input = match engine.next_deadline() {
            Some(deadline) => {
                let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
                tokio::select! {
                    input = rx.recv() => input,
                    _ = sleep => {
                        engine.tick();
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        let Some(input) = input else {
            debug!("All engine handles dropped");
            break;
        };

        match input {
            EngineInput::TitleChanged(text) => {
                engine.on_title_changed(text.as_deref());
            }
            EngineInput::InterceptedNotification(notification) => {
                engine.on_intercepted_notification(notification);
            }
            EngineInput::ScrapedRow(row) => {
                engine.on_scraped_row(row);
            }
            EngineInput::ScriptMessage { handler, body } => {
                engine.on_script_message(&handler, &body);
            }
            EngineInput::AcceptCall => {
                engine.accept_call();
            }
            EngineInput::DismissCall => {
                engine.dismiss_call();
            }
            EngineInput::SetSenderFilter(enabled) => {
                engine.set_sender_filter(enabled);
            }
            EngineInput::Snapshot(reply) => {
                engine.tick();
                let _ = reply.send(EngineSnapshot {
                    badge: engine.badge_state().clone(),
                    has_active_call: engine.has_active_call(),
                    active_conversation: engine.active_conversation().map(str::to_string),
                    sender_filter_enabled: engine.sender_filter_enabled(),
                });
            }
            EngineInput::Shutdown => break,
        }
    }

    info!("Signal engine stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::notification::{Decision, DecisionDispatcher, RecordingSink};
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn(config: SignalConfig) -> (EngineHandle, JoinHandle<()>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = DecisionDispatcher::new().with_sink(sink.clone());
        let engine = SignalEngine::new(config, TokioClock, dispatcher);
        let (handle, task) = spawn_engine(engine);
        (handle, task, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_inputs_are_processed_in_order() {
        let (handle, task, sink) = spawn(SignalConfig::default());

        handle.title_changed(Some("(1) Messenger")).unwrap();
        handle
            .intercepted_notification(InterceptedNotification::new("Bob", "hey"))
            .unwrap();
        handle
            .intercepted_notification(InterceptedNotification::new("Bob", "hey"))
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.badge.last_unread_count, 1);
        assert!(!snapshot.has_active_call);
        assert_eq!(sink.badge_updates(), vec![1]);
        assert_eq!(sink.deliveries().len(), 1);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescrape_timer_fires_without_input() {
        let (handle, task, sink) = spawn(SignalConfig::default());

        handle.title_changed(Some("(2) Messenger")).unwrap();
        handle.snapshot().await.unwrap();
        assert_eq!(sink.rescrape_requests(), 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.snapshot().await.unwrap();
        assert_eq!(sink.rescrape_requests(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_expires_on_its_own() {
        let (handle, task, sink) = spawn(SignalConfig::default());

        handle
            .intercepted_notification(
                InterceptedNotification::new("Alice is calling", "").with_tag("c1"),
            )
            .unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.has_active_call);
        assert_eq!(snapshot.active_conversation.as_deref(), Some("c1"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.has_active_call);
        assert!(sink
            .decisions()
            .contains(&Decision::CallEnded {
                reason: crate::call_detector::CallEndReason::Expired
            }));

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let (handle, task, _sink) = spawn(SignalConfig::default());
        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(handle.title_changed(None).is_err());
    }
}
