//! Error taxonomy for the monitoring pipeline.
//!
//! Fetch and store failures are absorbed at the per-event cycle boundary,
//! transport failures at the per-recipient boundary. None of these may
//! terminate the polling loop.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("render service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("render service returned malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("sms transport not configured")]
    NotConfigured,
    #[error("sms request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sms rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid phone number format: {0:?}")]
    InvalidPhone(String),
    #[error("phone number already registered and active")]
    AlreadyRegistered,
    #[error("phone number not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}
