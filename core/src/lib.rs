//! HTTP request engine.
//!
//! # Overview
//! Builds validated request descriptors, executes them over the network, and
//! optionally decodes the response body into a caller-chosen type. Every
//! failure lands in one closed taxonomy: invalid URL, transport failure,
//! decoding failure.
//!
//! # Design
//! - `HttpRequest` validates its URL at construction, so execution never
//!   sees a malformed URL.
//! - `Transport` is the only component touching the network; `UreqTransport`
//!   is the default.
//! - `Spider` runs one pipeline behind two calling conventions: `async`
//!   methods and callback methods (`*_with`). Both report identical errors.
//! - Diagnostics go through an injectable `LogSink`, toggled per call.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod http;
pub mod log;
pub mod transport;

pub use config::SpiderConfig;
pub use decode::decode;
pub use engine::Spider;
pub use error::{ErrorKind, InvalidUrlKind, SpiderError};
pub use http::{HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse};
pub use log::{LogSink, Outcome, RequestRecord, TracingSink};
pub use transport::{Transport, UreqTransport};
