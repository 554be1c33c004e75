//! Signal engine - the one owned state object behind every page signal
//!
//! All inbound operations run on `&mut self`, so badge, call and dedup state
//! are only ever touched from one place. Every entry point first fires the
//! timers that came due, then handles its own input, then hands the
//! resulting decisions to the dispatcher and returns them.

use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

use crate::badge::{BadgeEvent, BadgeExtractor, BadgeState};
use crate::call_detector::{CallDetector, CallEndReason, CallObservation, CallState};
use crate::classifier::{KeywordClassifier, RowBody, SignalClassifier};
use crate::config::SignalConfig;
use crate::error::SignalError;
use crate::intake::{
    InterceptedNotification, RawSignal, ScrapedRow, SignalIntake, SignalPayload, SignalSource,
    SCRAPE_HANDLER,
};
use crate::notification::{Candidate, Decision, DecisionDispatcher, Gatekeeper, SuppressReason};
use crate::timer::{Clock, SystemClock, TimerKind, Timers};

pub struct SignalEngine<C: Clock = SystemClock> {
    config: SignalConfig,
    classifier: Box<dyn SignalClassifier>,
    intake: SignalIntake,
    calls: CallDetector,
    badge: BadgeExtractor,
    gatekeeper: Gatekeeper,
    timers: Timers,
    dispatcher: DecisionDispatcher,
    clock: C,
}

impl SignalEngine<SystemClock> {
    pub fn with_system_clock(config: SignalConfig, dispatcher: DecisionDispatcher) -> Self {
        Self::new(config, SystemClock, dispatcher)
    }
}

impl<C: Clock> SignalEngine<C> {
    pub fn new(config: SignalConfig, clock: C, dispatcher: DecisionDispatcher) -> Self {
        Self {
            classifier: Box::new(KeywordClassifier::new(&config)),
            intake: SignalIntake::new(),
            calls: CallDetector::from_config(&config),
            badge: BadgeExtractor::new(),
            gatekeeper: Gatekeeper::new(&config),
            timers: Timers::new(),
            dispatcher,
            clock,
            config,
        }
    }

    /// Swap the matching rules without touching the state machines
    pub fn with_classifier(mut self, classifier: Box<dyn SignalClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn badge_state(&self) -> &BadgeState {
        self.badge.state()
    }

    pub fn call_state(&self) -> &CallState {
        self.calls.state()
    }

    pub fn has_active_call(&self) -> bool {
        self.calls.has_active_call()
    }

    /// Conversation of the ringing call, when it is known
    pub fn active_conversation(&self) -> Option<&str> {
        self.calls.active_conversation()
    }

    pub fn sender_filter_enabled(&self) -> bool {
        self.gatekeeper.sender_filter_enabled()
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// When the engine next needs a [`tick`](Self::tick)
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    // ==================== inbound ====================

    pub fn on_title_changed(&mut self, text: Option<&str>) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        let signal = self.intake.title(text, now);
        decisions.extend(self.process(signal));
        self.emit(decisions)
    }

    pub fn on_intercepted_notification(
        &mut self,
        notification: InterceptedNotification,
    ) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        match self.intake.intercepted(notification, now) {
            Ok(signal) => decisions.extend(self.process(signal)),
            Err(e) => log_dropped(SignalSource::InterceptedNotification, &e),
        }
        self.emit(decisions)
    }

    pub fn on_scraped_row(&mut self, row: ScrapedRow) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        match self.intake.scraped_row(row, now) {
            Ok(signal) => decisions.extend(self.process(signal)),
            Err(e) => log_dropped(SignalSource::ScrapedRow, &e),
        }
        self.emit(decisions)
    }

    /// Raw message from one of the injected page scripts
    pub fn on_script_message(&mut self, handler: &str, body: &Value) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        match self.intake.parse_script_message(handler, body, now) {
            Ok(signals) if handler == SCRAPE_HANDLER => {
                match latest_scraped(signals, self.classifier.as_ref()) {
                    Some(signal) => decisions.extend(self.process(signal)),
                    None => debug!("Scrape batch had only status rows"),
                }
            }
            Ok(signals) => {
                for signal in signals {
                    decisions.extend(self.process(signal));
                }
            }
            Err(e) => debug!(handler, error = %e, "Script message produced no signal"),
        }
        self.emit(decisions)
    }

    pub fn accept_call(&mut self) -> Vec<Decision> {
        self.end_call_by_user(CallEndReason::Accepted)
    }

    pub fn dismiss_call(&mut self) -> Vec<Decision> {
        self.end_call_by_user(CallEndReason::Dismissed)
    }

    pub fn set_sender_filter(&mut self, enabled: bool) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        decisions.extend(
            self.gatekeeper
                .set_sender_filter(enabled, self.badge.state_mut()),
        );
        self.emit(decisions)
    }

    /// Fire every timer that is due
    pub fn tick(&mut self) -> Vec<Decision> {
        let now = self.clock.now();
        let decisions = self.fire_due(now);
        self.emit(decisions)
    }

    /// Route one normalized signal. Decisions are returned, not dispatched.
    pub fn process(&mut self, signal: RawSignal) -> Vec<Decision> {
        let source = signal.source();

        if let SignalPayload::Title(text) = &signal.payload {
            let mut decisions =
                match self.calls.observe(&signal, self.classifier.as_ref()) {
                    CallObservation::NotACall => Vec::new(),
                    other => self.on_call_observation(other, None, signal.received_at),
                };
            if let Some(event) = self.badge.extract(text.as_deref(), self.classifier.as_ref()) {
                decisions.extend(self.on_badge_event(event, signal.received_at));
            }
            return decisions;
        }

        let candidate = match Candidate::from_signal(&signal, self.classifier.as_ref()) {
            Ok(candidate) => candidate,
            Err(e) => {
                log_dropped(source, &e);
                return Vec::new();
            }
        };

        match self.calls.observe(&signal, self.classifier.as_ref()) {
            CallObservation::NotACall => self.gatekeeper.on_candidate(
                candidate,
                self.badge.state_mut(),
                self.classifier.as_ref(),
                self.calls.active_conversation(),
            ),
            other => {
                let notification =
                    (source == SignalSource::InterceptedNotification).then_some(candidate);
                self.on_call_observation(other, notification, signal.received_at)
            }
        }
    }

    // ==================== internals ====================

    fn on_call_observation(
        &mut self,
        observation: CallObservation,
        notification: Option<Candidate>,
        now: Instant,
    ) -> Vec<Decision> {
        match observation {
            CallObservation::NotACall => Vec::new(),
            CallObservation::Prompt {
                conversation_id,
                timer,
            } => {
                self.cancel_call_timers();
                self.timers.schedule_once(timer.kind, timer.after, now);
                info!(conversation_id = ?conversation_id, "Incoming call detected");
                self.gatekeeper
                    .authorize_call_prompt(conversation_id, notification)
            }
            CallObservation::Refreshed { timer } => {
                if let Some(timer) = timer {
                    // Once a hard expiry guards the call, silence no longer ends it
                    if timer.kind == TimerKind::CallExpiry {
                        self.timers.cancel(TimerKind::CallSilence);
                    }
                    self.timers.schedule_once(timer.kind, timer.after, now);
                }
                Vec::new()
            }
            CallObservation::Muted => vec![Decision::suppress(SuppressReason::CallMuted)],
        }
    }

    fn on_badge_event(&mut self, event: BadgeEvent, now: Instant) -> Vec<Decision> {
        match event {
            BadgeEvent::CountChanged(count) => {
                debug!(count, "Unread count changed, scheduling re-scrape");
                self.timers.schedule_once(
                    TimerKind::Rescrape,
                    self.config.rescrape_delay(),
                    now,
                );
            }
            BadgeEvent::Cleared => {
                self.timers.cancel(TimerKind::Rescrape);
            }
        }
        self.gatekeeper.on_badge_event(event, self.badge.state_mut())
    }

    fn fire_due(&mut self, now: Instant) -> Vec<Decision> {
        let mut decisions = Vec::new();
        for kind in self.timers.take_due(now) {
            match kind {
                TimerKind::Rescrape => decisions.push(Decision::RequestRescrape),
                TimerKind::CallSilence => {
                    decisions.extend(self.end_call(CallEndReason::Silence, now));
                }
                TimerKind::CallExpiry => {
                    decisions.extend(self.end_call(CallEndReason::Expired, now));
                }
            }
        }
        decisions
    }

    fn end_call_by_user(&mut self, reason: CallEndReason) -> Vec<Decision> {
        let now = self.clock.now();
        let mut decisions = self.fire_due(now);
        decisions.extend(self.end_call(reason, now));
        self.emit(decisions)
    }

    fn end_call(&mut self, reason: CallEndReason, now: Instant) -> Option<Decision> {
        self.cancel_call_timers();
        let session = self.calls.end(reason, now)?;
        info!(
            reason = ?reason,
            conversation_id = ?session.conversation_id,
            "Call session ended"
        );
        Some(Decision::CallEnded { reason })
    }

    fn cancel_call_timers(&mut self) {
        self.timers.cancel(TimerKind::CallSilence);
        self.timers.cancel(TimerKind::CallExpiry);
    }

    fn emit(&self, decisions: Vec<Decision>) -> Vec<Decision> {
        for decision in &decisions {
            self.dispatcher.dispatch(decision);
        }
        decisions
    }
}

/// One scrape batch is one snapshot of the sidebar, so it yields one
/// candidate: the first unread message row, else the first row that maps to
/// the `read` sentinel. Status-only batches yield nothing.
fn latest_scraped(
    signals: Vec<RawSignal>,
    classifier: &dyn SignalClassifier,
) -> Option<RawSignal> {
    let body_class = |signal: &RawSignal| match &signal.payload {
        SignalPayload::ScrapedRow { body, is_unread, .. } => {
            Some((classifier.classify_row_body(body), *is_unread))
        }
        _ => None,
    };

    let unread = signals.iter().position(|signal| {
        matches!(body_class(signal), Some((RowBody::Message, true)))
    });
    let index = unread.or_else(|| {
        signals
            .iter()
            .position(|signal| !matches!(body_class(signal), Some((RowBody::Status, _)) | None))
    })?;
    signals.into_iter().nth(index)
}

fn log_dropped(source: SignalSource, error: &SignalError) {
    debug!(channel = source.as_str(), error = %error, "Signal dropped");
}
