//! Error taxonomy for the detection/notification pipeline.
//!
//! Per-source fetch/detector errors are caught by the orchestrator and
//! become a `fetch-error` status; they never abort a cycle. Notify errors
//! surface as warnings on the cycle result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("network failure: {0}")]
    Network(String),
    #[error("unexpected status code {0}")]
    BadStatus(u16),
    #[error("empty or undecodable response body")]
    MalformedContent,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("stored snapshot content is unreadable")]
    UnreadableContent,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("no recipients configured")]
    NoRecipients,
}
