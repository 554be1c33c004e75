//! Signal errors - every variant degrades to "no action", none is fatal

use thiserror::Error;

/// Reasons a raw page signal could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Text or payload does not match any known shape
    #[error("malformed signal: {0}")]
    MalformedSignal(String),
    /// DOM scrape found no conversation container
    #[error("unrecognized page structure")]
    UnrecognizedPageStructure,
    /// A deferred badge value was never reconciled and got replaced
    #[error("stale pending badge {0}")]
    StaleState(u32),
}

impl SignalError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        SignalError::MalformedSignal(detail.into())
    }
}
