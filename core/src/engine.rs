//! Request engine: one pipeline, two calling conventions.
//!
//! # Design
//! Every operation builds the same owned future: transport, then status
//! check, then (for the decoding shapes) `decode`. The awaited shapes simply
//! await it; the callback shapes spawn it and hand the terminal result to an
//! `FnOnce`, so a continuation can run at most once and the pipeline makes
//! sure it runs exactly once. `Spider` holds only shared, immutable parts
//! (transport, sink, runtime handle) and is cheap to clone across tasks.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::runtime::{self, Handle};

use crate::config::SpiderConfig;
use crate::decode::decode;
use crate::error::SpiderError;
use crate::http::{HttpRequest, HttpResponse};
use crate::log::{LogSink, Outcome, RequestRecord, TracingSink};
use crate::transport::{Transport, UreqTransport};

/// HTTP request engine.
///
/// ```ignore
/// let spider = Spider::new();
/// let request = HttpRequest::new("https://rickandmortyapi.com/api/character")?;
/// let page: CharacterPage = spider.perform_request_as(request, true).await?;
/// ```
pub struct Spider<T = UreqTransport> {
    transport: Arc<T>,
    sink: Arc<dyn LogSink>,
    runtime: Option<Handle>,
}

impl<T> Clone for Spider<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
            runtime: self.runtime.clone(),
        }
    }
}

impl Default for Spider<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl Spider<UreqTransport> {
    pub fn new() -> Self {
        Self::from_config(SpiderConfig::default())
    }

    pub fn from_config(config: SpiderConfig) -> Self {
        Self::with_transport(UreqTransport::new(&config))
    }
}

impl<T: Transport> Spider<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            sink: Arc::new(TracingSink),
            runtime: None,
        }
    }

    /// Replace the default `TracingSink`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runtime the callback shapes spawn onto.
    ///
    /// Without one, callbacks use the ambient tokio runtime, or a dedicated
    /// thread with its own current-thread runtime when called from outside
    /// any runtime. If this runtime has shut down, callbacks receive a
    /// transport failure.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch raw bytes, suspending the calling task until the network
    /// stage completes.
    pub async fn perform_request(
        &self,
        request: HttpRequest,
        logging: bool,
    ) -> Result<Bytes, SpiderError> {
        self.pipeline(request, logging).await
    }

    /// Fetch raw bytes and pass the result to `on_complete` once finished.
    ///
    /// Returns immediately; `on_complete` runs on a runtime thread.
    pub fn perform_request_with<F>(&self, request: HttpRequest, logging: bool, on_complete: F)
    where
        F: FnOnce(Result<Bytes, SpiderError>) + Send + 'static,
    {
        self.spawn(self.pipeline(request, logging), on_complete);
    }

    /// Fetch and decode the body into `D`.
    pub async fn perform_request_as<D>(
        &self,
        request: HttpRequest,
        logging: bool,
    ) -> Result<D, SpiderError>
    where
        D: DeserializeOwned + Send + 'static,
    {
        self.decoding_pipeline(request, logging).await
    }

    /// Fetch and decode the body into `D`, delivering the result to
    /// `on_complete`.
    pub fn perform_request_as_with<D, F>(&self, request: HttpRequest, logging: bool, on_complete: F)
    where
        D: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<D, SpiderError>) + Send + 'static,
    {
        self.spawn(self.decoding_pipeline(request, logging), on_complete);
    }

    fn pipeline(
        &self,
        request: HttpRequest,
        logging: bool,
    ) -> impl Future<Output = Result<Bytes, SpiderError>> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        let sink = logging.then(|| Arc::clone(&self.sink));
        async move {
            let record = RequestRecord::new(&request);
            if let Some(sink) = &sink {
                sink.dispatched(&record);
            }

            let result = transport.execute(&request).await.and_then(check_status);

            if let Some(sink) = &sink {
                let outcome = match &result {
                    Ok(body) => Outcome::Succeeded { bytes: body.len() },
                    Err(err) => Outcome::Failed(err),
                };
                sink.completed(&record, outcome);
            }
            result
        }
    }

    fn decoding_pipeline<D>(
        &self,
        request: HttpRequest,
        logging: bool,
    ) -> impl Future<Output = Result<D, SpiderError>> + Send + 'static
    where
        D: DeserializeOwned + Send + 'static,
    {
        let fetch = self.pipeline(request, logging);
        async move {
            let body = fetch.await?;
            decode(&body)
        }
    }

    fn spawn<O, Fut, F>(&self, pipeline: Fut, on_complete: F)
    where
        O: Send + 'static,
        Fut: Future<Output = Result<O, SpiderError>> + Send + 'static,
        F: FnOnce(Result<O, SpiderError>) + Send + 'static,
    {
        match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                let completion = Completion::new(on_complete);
                handle.spawn(async move { completion.complete(pipeline.await) });
            }
            None => {
                std::thread::spawn(move || {
                    match runtime::Builder::new_current_thread().enable_all().build() {
                        Ok(rt) => on_complete(rt.block_on(pipeline)),
                        Err(err) => on_complete(Err(SpiderError::transport(err))),
                    }
                });
            }
        }
    }
}

/// Delivers the terminal result exactly once.
///
/// If the spawned task is dropped before finishing (the runtime behind the
/// handle was shut down), the continuation still runs, with a transport
/// failure.
struct Completion<O, F>
where
    F: FnOnce(Result<O, SpiderError>),
{
    on_complete: Option<F>,
    _output: PhantomData<fn(O)>,
}

impl<O, F> Completion<O, F>
where
    F: FnOnce(Result<O, SpiderError>),
{
    fn new(on_complete: F) -> Self {
        Self {
            on_complete: Some(on_complete),
            _output: PhantomData,
        }
    }

    fn complete(mut self, result: Result<O, SpiderError>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(result);
        }
    }
}

impl<O, F> Drop for Completion<O, F>
where
    F: FnOnce(Result<O, SpiderError>),
{
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Err(SpiderError::transport(std::io::Error::other(
                "runtime shut down before the request completed",
            ))));
        }
    }
}

/// Fold non-2xx responses into the transport-failure category.
fn check_status(response: HttpResponse) -> Result<Bytes, SpiderError> {
    if response.is_success() {
        return Ok(response.body);
    }
    Err(SpiderError::http_status(response.status, &response.body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::task::{Context, Poll, Waker};
    use tokio::sync::oneshot;
    use tracing_test::traced_test;

    /// Answers every request with a fixed status and body.
    struct Scripted {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Transport for Scripted {
        async fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, SpiderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    /// Always fails at the network stage.
    struct Unreachable;

    impl Transport for Unreachable {
        async fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, SpiderError> {
            Err(SpiderError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl LogSink for Lines {
        fn dispatched(&self, record: &RequestRecord) {
            self.0
                .lock()
                .unwrap()
                .push(format!("-> {} {}", record.method, record.url));
        }

        fn completed(&self, record: &RequestRecord, outcome: Outcome<'_>) {
            let line = match outcome {
                Outcome::Succeeded { bytes } => format!("<- {} {bytes} bytes", record.url),
                Outcome::Failed(err) => format!("<- {} failed: {err}", record.url),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Info {
        count: u32,
    }

    fn request() -> HttpRequest {
        HttpRequest::new("https://example.com/api/x").unwrap()
    }

    #[tokio::test]
    async fn awaited_returns_body_on_success() {
        let spider = Spider::with_transport(Scripted::new(200, "hello"));
        let body = spider.perform_request(request(), false).await.unwrap();
        assert_eq!(body, "hello");
        assert_eq!(spider.transport().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_transport_failure() {
        let spider = Spider::with_transport(Scripted::new(404, r#"{"count":1}"#));
        let err = spider
            .perform_request_as::<Info>(request(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn transport_failure_short_circuits_decoding() {
        let spider = Spider::with_transport(Unreachable);
        let err = spider
            .perform_request_as::<Info>(request(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[tokio::test]
    async fn decoded_shape_matches_manual_decoding() {
        let body = r#"{"count":826}"#;
        let spider = Spider::with_transport(Scripted::new(200, body));
        let info: Info = spider.perform_request_as(request(), false).await.unwrap();
        assert_eq!(info, serde_json::from_str::<Info>(body).unwrap());
    }

    #[tokio::test]
    async fn callback_and_awaited_agree() {
        let spider = Spider::with_transport(Scripted::new(200, "not json"));

        let awaited = spider.perform_request_as::<Info>(request(), false).await;

        let (tx, rx) = oneshot::channel();
        spider.perform_request_as_with::<Info, _>(request(), false, move |result| {
            let _ = tx.send(result);
        });
        let called_back = rx.await.unwrap();

        assert_eq!(
            awaited.unwrap_err().kind(),
            called_back.unwrap_err().kind()
        );
        assert_eq!(spider.transport().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callback_outside_runtime_still_completes() {
        let spider = Spider::with_transport(Scripted::new(200, "ok"));
        let (tx, rx) = std::sync::mpsc::channel();
        spider.perform_request_with(request(), false, move |result| {
            let _ = tx.send(result);
        });
        let body = rx.recv().unwrap().unwrap();
        assert_eq!(body, "ok");
    }

    #[test]
    fn callback_uses_configured_runtime() {
        let rt = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let spider =
            Spider::with_transport(Scripted::new(200, "ok")).with_runtime(rt.handle().clone());
        let (tx, rx) = std::sync::mpsc::channel();
        spider.perform_request_with(request(), false, move |result| {
            let _ = tx.send(result.map(|body| body.len()));
        });
        assert_eq!(rx.recv().unwrap().unwrap(), 2);
    }

    #[test]
    fn callback_on_shut_down_runtime_reports_transport_failure() {
        let rt = runtime::Builder::new_current_thread().build().unwrap();
        let handle = rt.handle().clone();
        drop(rt);

        let spider = Spider::with_transport(Scripted::new(200, "ok")).with_runtime(handle);
        let (tx, rx) = std::sync::mpsc::channel();
        spider.perform_request_with(request(), false, move |result| {
            let _ = tx.send(result);
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("callback must run once");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::TransportFailure);
        assert!(rx.recv_timeout(std::time::Duration::from_millis(50)).is_err());
    }

    #[test]
    fn awaited_shape_outside_runtime_does_not_panic() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let spider = Spider::new();
        let request = HttpRequest::new(&format!("http://{addr}/api/x")).unwrap();
        let mut fut = std::pin::pin!(spider.perform_request(request, true));
        let mut cx = Context::from_waker(Waker::noop());
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Err(err)) => assert_eq!(err.kind(), ErrorKind::TransportFailure),
            other => panic!("expected an immediate transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sink_sees_dispatch_and_completion_when_logging() {
        let lines = Arc::new(Lines::default());
        let spider =
            Spider::with_transport(Scripted::new(200, "hello")).with_log_sink(lines.clone());

        spider.perform_request(request(), true).await.unwrap();

        let lines = lines.0.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                "-> GET https://example.com/api/x".to_string(),
                "<- https://example.com/api/x 5 bytes".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn sink_reports_failure() {
        let lines = Arc::new(Lines::default());
        let spider = Spider::with_transport(Scripted::new(500, "boom")).with_log_sink(lines.clone());

        let _ = spider.perform_request(request(), true).await;

        let lines = lines.0.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "<- https://example.com/api/x failed: HTTP 500: boom");
    }

    #[tokio::test]
    async fn sink_is_silent_when_logging_is_off() {
        let lines = Arc::new(Lines::default());
        let spider =
            Spider::with_transport(Scripted::new(200, "hello")).with_log_sink(lines.clone());

        spider.perform_request(request(), false).await.unwrap();

        assert!(lines.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn default_sink_writes_tracing_events() {
        let spider = Spider::with_transport(Scripted::new(200, "hello"));
        spider.perform_request(request(), true).await.unwrap();

        assert!(logs_contain("dispatching request"));
        assert!(logs_contain("https://example.com/api/x"));
        assert!(logs_contain("bytes=5"));
    }

    #[test]
    fn check_status_accepts_2xx_only() {
        let response = |status| HttpResponse {
            status,
            body: Bytes::from_static(b"x"),
        };
        assert!(check_status(response(200)).is_ok());
        assert!(check_status(response(299)).is_ok());
        assert_eq!(check_status(response(302)).unwrap_err().status(), Some(302));
        assert_eq!(check_status(response(503)).unwrap_err().status(), Some(503));
    }
}
