//! Diagnostic side channel for the engine.
//!
//! # Design
//! The engine calls a `LogSink` at exactly two points per request: before
//! the transport runs and after the terminal transport result is known.
//! Each call carries a `RequestRecord` with its own correlation id, so lines
//! from concurrent requests can be told apart without any shared state.
//! Sinks must not influence control flow; they receive borrowed views only.

use uuid::Uuid;

use crate::error::SpiderError;
use crate::http::{HttpMethod, HttpRequest};

/// Identifies one dispatched request in log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub id: Uuid,
    pub method: HttpMethod,
    pub url: String,
}

impl RequestRecord {
    /// The recorded URL never carries a password.
    pub fn new(request: &HttpRequest) -> Self {
        let mut url = request.url().clone();
        // Only fails for URLs that cannot hold credentials in the first place.
        let _ = url.set_password(None);
        Self {
            id: Uuid::new_v4(),
            method: request.method(),
            url: url.to_string(),
        }
    }
}

/// How the network stage of a request ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Succeeded { bytes: usize },
    Failed(&'a SpiderError),
}

pub trait LogSink: Send + Sync {
    fn dispatched(&self, record: &RequestRecord);
    fn completed(&self, record: &RequestRecord, outcome: Outcome<'_>);
}

/// Default sink: emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn dispatched(&self, record: &RequestRecord) {
        tracing::info!(
            request_id = %record.id,
            method = %record.method,
            url = %record.url,
            "dispatching request"
        );
    }

    fn completed(&self, record: &RequestRecord, outcome: Outcome<'_>) {
        match outcome {
            Outcome::Succeeded { bytes } => tracing::info!(
                request_id = %record.id,
                method = %record.method,
                url = %record.url,
                bytes,
                "request succeeded"
            ),
            Outcome::Failed(error) => tracing::warn!(
                request_id = %record.id,
                method = %record.method,
                url = %record.url,
                %error,
                kind = ?error.kind(),
                "request failed"
            ),
        }
    }
}
