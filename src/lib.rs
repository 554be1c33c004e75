//! Messenger Signal - unread badge, call prompts and de-duplicated
//! notifications derived from a web messenger's title and DOM signals

pub mod actor;
pub mod badge;
pub mod call_detector;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod intake;
pub mod notification;
pub mod timer;

pub use actor::{spawn_engine, EngineHandle, EngineInput, EngineSnapshot, TokioClock};
pub use badge::{BadgeEvent, BadgeExtractor, BadgeState};
pub use call_detector::{CallDetector, CallEndReason, CallSession, CallState};
pub use classifier::{KeywordClassifier, RowBody, SignalClassifier, TitleClass};
pub use config::SignalConfig;
pub use engine::SignalEngine;
pub use error::SignalError;
pub use intake::{
    InterceptedNotification, RawSignal, ScrapedRow, SignalIntake, SignalPayload, SignalSource,
};
pub use notification::{
    Decision, DecisionDispatcher, Delivery, DeliverySink, JsonLinesSink, RecordingSink,
    SendResult, SuppressReason,
};
pub use timer::{Clock, ManualClock, SystemClock, TimerKind, Timers};
