//! Incoming-call detection - `Idle` / `CallActive` state machine
//!
//! The same real call usually shows up twice: the page changes its title to a
//! ringing banner and it also fires a web notification. Both are collapsed
//! into one session. Conversation ids win when both sides carry one; the
//! title channel never does, so a signal without an id joins the active call.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::classifier::SignalClassifier;
use crate::config::SignalConfig;
use crate::intake::{RawSignal, SignalSource};
use crate::timer::TimerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEndReason {
    Accepted,
    Dismissed,
    /// No ringing title for the silence window
    Silence,
    /// Hard expiry; the call was most likely missed
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub conversation_id: Option<String>,
    /// Normalized text that raised the prompt
    pub alerted_key: String,
    /// Channel of the latest signal
    pub channel: SignalSource,
    /// Seen on a notification or scrape; only the hard expiry can end it now
    pub hard_expiry: bool,
    pub started_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    CallActive(CallSession),
}

/// Timer the engine should (re)arm for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimer {
    pub kind: TimerKind,
    pub after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallObservation {
    NotACall,
    /// New session, the user should be prompted
    Prompt {
        conversation_id: Option<String>,
        timer: CallTimer,
    },
    /// Same call seen again, no new prompt. `timer` is the one kind to
    /// re-arm; `None` when a title refreshes a call under hard expiry.
    Refreshed { timer: Option<CallTimer> },
    /// Call text the user already accepted or dismissed
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MutedCall {
    key: String,
    conversation_id: Option<String>,
    until: Instant,
}

pub struct CallDetector {
    state: CallState,
    muted: Option<MutedCall>,
    silence_window: Duration,
    expiry_window: Duration,
}

impl CallDetector {
    pub fn new(silence_window: Duration, expiry_window: Duration) -> Self {
        Self {
            state: CallState::Idle,
            muted: None,
            silence_window,
            expiry_window,
        }
    }

    pub fn from_config(config: &SignalConfig) -> Self {
        Self::new(config.call_silence(), config.call_expiry())
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn has_active_call(&self) -> bool {
        matches!(self.state, CallState::CallActive(_))
    }

    pub fn session(&self) -> Option<&CallSession> {
        match &self.state {
            CallState::CallActive(session) => Some(session),
            CallState::Idle => None,
        }
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.session().and_then(|s| s.conversation_id.as_deref())
    }

    fn timer_for(&self, source: SignalSource) -> CallTimer {
        match source {
            SignalSource::TitleText => CallTimer {
                kind: TimerKind::CallSilence,
                after: self.silence_window,
            },
            SignalSource::InterceptedNotification | SignalSource::ScrapedRow => CallTimer {
                kind: TimerKind::CallExpiry,
                after: self.expiry_window,
            },
        }
    }

    /// Feed one signal through the state machine
    pub fn observe(
        &mut self,
        signal: &RawSignal,
        classifier: &dyn SignalClassifier,
    ) -> CallObservation {
        let text = signal.combined_text();
        let now = signal.received_at;

        if classifier.match_call(&text).is_none() {
            // The ringing banner left the title; the same text may ring again
            if signal.source() == SignalSource::TitleText {
                self.muted = None;
            }
            return CallObservation::NotACall;
        }

        let key = normalize_key(&text);
        let conversation_id = signal.conversation_id().map(str::to_string);
        let timer = self.timer_for(signal.source());

        if let CallState::CallActive(session) = &mut self.state {
            if is_same_call(
                session.conversation_id.as_deref(),
                &session.alerted_key,
                conversation_id.as_deref(),
                &key,
            ) {
                if session.conversation_id.is_none() {
                    session.conversation_id = conversation_id;
                }
                session.channel = signal.source();
                let rearm = match timer.kind {
                    TimerKind::CallExpiry => {
                        session.hard_expiry = true;
                        Some(timer)
                    }
                    _ if session.hard_expiry => None,
                    _ => Some(timer),
                };
                if let Some(timer) = rearm {
                    session.expires_at = now + timer.after;
                }
                debug!(
                    channel = signal.source().as_str(),
                    key = %session.alerted_key,
                    hard_expiry = session.hard_expiry,
                    "Call signal refreshed active session"
                );
                return CallObservation::Refreshed { timer: rearm };
            }
        } else if let Some(muted) = &self.muted {
            let same = is_same_call(
                muted.conversation_id.as_deref(),
                &muted.key,
                conversation_id.as_deref(),
                &key,
            );
            if same && now < muted.until {
                debug!(key = %key, "Call already handled, not prompting again");
                return CallObservation::Muted;
            }
        }

        self.muted = None;
        self.state = CallState::CallActive(CallSession {
            conversation_id: conversation_id.clone(),
            alerted_key: key,
            channel: signal.source(),
            hard_expiry: timer.kind == TimerKind::CallExpiry,
            started_at: now,
            expires_at: now + timer.after,
        });
        CallObservation::Prompt {
            conversation_id,
            timer,
        }
    }

    /// Leave `CallActive`. Returns the ended session, `None` when already idle.
    pub fn end(&mut self, reason: CallEndReason, now: Instant) -> Option<CallSession> {
        let session = match std::mem::replace(&mut self.state, CallState::Idle) {
            CallState::CallActive(session) => session,
            CallState::Idle => return None,
        };

        // A user decision mutes the lingering banner text for a while
        if matches!(reason, CallEndReason::Accepted | CallEndReason::Dismissed) {
            self.muted = Some(MutedCall {
                key: session.alerted_key.clone(),
                conversation_id: session.conversation_id.clone(),
                until: now + self.expiry_window,
            });
        }
        Some(session)
    }
}

/// Ids decide when both sides have one; a lone id joins; otherwise keys
fn is_same_call(
    known_id: Option<&str>,
    known_key: &str,
    conversation_id: Option<&str>,
    key: &str,
) -> bool {
    match (known_id, conversation_id) {
        (Some(known), Some(incoming)) => known == incoming,
        (Some(_), None) | (None, Some(_)) => true,
        (None, None) => known_key == key,
    }
}

fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
