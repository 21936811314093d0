//! Transport executor: one request in, one raw response out.
//!
//! # Design
//! `Transport` is the seam between the engine and the network. The default
//! `UreqTransport` drives a blocking `ureq` agent on tokio's blocking pool,
//! so awaiting it suspends the calling task without tying up a runtime
//! worker. Polled outside any tokio runtime, it runs inline on the polling
//! thread instead. Status codes are returned as data (`http_status_as_error(false)`);
//! the engine decides what a non-2xx status means.

use std::future::Future;

use bytes::Bytes;
use tokio::runtime::Handle;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::config::SpiderConfig;
use crate::error::SpiderError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes a single HTTP request.
///
/// Implementations make exactly one attempt per call and map every
/// stack-level failure to `SpiderError::Transport`.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, SpiderError>> + Send;
}

/// `Transport` backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    user_agent: String,
    max_response_bytes: u64,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&SpiderConfig::default())
    }
}

impl UreqTransport {
    pub fn new(config: &SpiderConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
            max_response_bytes: config.max_response_bytes,
        }
    }

    /// Run the request on the current thread. Blocks until the body is read.
    fn execute_blocking(&self, request: &HttpRequest) -> Result<HttpResponse, ureq::Error> {
        let url = request.url().as_str();
        let mut response = match request.method() {
            HttpMethod::Get => self.call(self.agent.get(url), request),
            HttpMethod::Head => self.call(self.agent.head(url), request),
            HttpMethod::Delete => self.call(self.agent.delete(url), request),
            HttpMethod::Options => self.call(self.agent.options(url), request),
            HttpMethod::Post => self.send(self.agent.post(url), request),
            HttpMethod::Put => self.send(self.agent.put(url), request),
            HttpMethod::Patch => self.send(self.agent.patch(url), request),
        }?;

        let status = response.status().as_u16();
        let body = if request.method() == HttpMethod::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(self.max_response_bytes)
                .read_to_vec()?
        };

        Ok(HttpResponse {
            status,
            body: Bytes::from(body),
        })
    }

    fn call(
        &self,
        builder: RequestBuilder<WithoutBody>,
        request: &HttpRequest,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let builder = self.apply_headers(builder, request);
        match request.body() {
            Some(body) => builder.force_send_body().send(&body[..]),
            None => builder.call(),
        }
    }

    fn send(
        &self,
        builder: RequestBuilder<WithBody>,
        request: &HttpRequest,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let builder = self.apply_headers(builder, request);
        match request.body() {
            Some(body) => builder.send(&body[..]),
            None => builder.send_empty(),
        }
    }

    fn apply_headers<B>(
        &self,
        mut builder: RequestBuilder<B>,
        request: &HttpRequest,
    ) -> RequestBuilder<B> {
        if request.header("user-agent").is_none() {
            builder = builder.header("user-agent", self.user_agent.as_str());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SpiderError> {
        // Outside tokio there is no blocking pool; run on the polling thread.
        if Handle::try_current().is_err() {
            return self
                .execute_blocking(request)
                .map_err(SpiderError::transport);
        }
        let transport = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || transport.execute_blocking(&request))
            .await
            .map_err(SpiderError::transport)?
            .map_err(SpiderError::transport)
    }
}
