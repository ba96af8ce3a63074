//! Error types for the outreach pipeline.
//!
//! Three concerns, kept separate so each layer only matches on what it
//! can actually handle: intake validation (rejected before enqueue),
//! capability calls (absorbed by the quality gate), and webhook
//! delivery (isolated per prospect, never retried).

use thiserror::Error;

/// Intake validation failures. Returned as HTTP 400; a request that
/// fails validation is never enqueued.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("No items provided")]
    EmptyItems,

    #[error("Item at index {0} is missing an id")]
    MissingItemId(usize),

    #[error("callbackTarget is required")]
    MissingCallback,

    #[error("callbackTarget is not a valid http(s) URL: {0}")]
    InvalidCallback(String),

    #[error("numberOfResults must be at least 1")]
    ZeroResults,
}

/// External capability call failures (research, scoring, variant
/// generation, best-variant selection). These feed the quality gate as
/// rejected attempts and never propagate past it.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Capability endpoint unreachable: {0}")]
    Connection(String),

    #[error("Capability call timed out after {0}s")]
    Timeout(u64),

    #[error("Capability returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Webhook delivery failures. Logged with the prospect id; a failed
/// delivery neither retries nor blocks the remaining deliveries.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook unreachable: {0}")]
    Connection(String),

    #[error("Webhook request failed: {0}")]
    Http(String),

    #[error("Webhook returned status {0}")]
    Status(u16),
}
