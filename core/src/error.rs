//! Error taxonomy for the request engine.
//!
//! # Design
//! `SpiderError` keeps the underlying cause of every failure so callers can
//! walk the `source()` chain, while `ErrorKind` projects it onto the closed
//! set of categories callers branch on: invalid URL, transport failure,
//! decoding failure. Non-2xx responses get their own variant with the status
//! and a body preview, but classify as `TransportFailure`.

use thiserror::Error;

/// Longest body excerpt kept in `SpiderError::HttpStatus`.
pub(crate) const BODY_PREVIEW_LIMIT: usize = 256;

/// The closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The URL string could not form an absolute URL with scheme and host.
    InvalidUrl,
    /// The network call failed or the server answered with a non-2xx status.
    TransportFailure,
    /// Bytes arrived but did not match the requested type.
    DecodingFailed,
}

/// Why a URL string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUrlKind {
    /// Malformed syntax (invalid characters, bad port, ...).
    ParseError,
    /// No scheme, so the string is at best a relative reference.
    MissingScheme,
    /// Parsed, but has no host (`mailto:`, `file:///`, `http://`).
    MissingHost,
}

/// Errors produced by request construction and by every engine operation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SpiderError {
    /// Rejected at construction; never produced by the execution stage.
    ///
    /// `reason` is diagnostic text only; match on `kind`.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        url: String,
        kind: InvalidUrlKind,
        reason: String,
    },

    /// Network-stack failure: DNS, connect, timeout, malformed response.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered outside 200-299.
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus { status: u16, body_preview: String },

    /// The response body could not be decoded into the requested type.
    #[error("decoding failed: {0}")]
    DecodingFailed(#[from] serde_json::Error),
}

impl SpiderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpiderError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            SpiderError::Transport(_) | SpiderError::HttpStatus { .. } => {
                ErrorKind::TransportFailure
            }
            SpiderError::DecodingFailed(_) => ErrorKind::DecodingFailed,
        }
    }

    /// Status code of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            SpiderError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SpiderError::Transport(Box::new(err))
    }

    pub(crate) fn http_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body_preview = match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.into_owned(),
        };
        SpiderError::HttpStatus {
            status,
            body_preview,
        }
    }
}
