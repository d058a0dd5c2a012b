//! Fetch transport contracts, request/response models, and a scripted test transport.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use bytes::Bytes;
use serde::Serialize;

use crate::abort::AbortSignal;

/// Object-safe boxed future used by [`HttpTransport`] async methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// HTTP verbs issued by the portal HTTP client.
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `HEAD`
    Head,
}

impl HttpMethod {
    /// Returns the wire token for the method.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
        }
    }

    /// Parses a wire token case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let method = match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            "HEAD" => Self::Head,
            _ => return None,
        };
        Some(method)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Case-insensitive header collection preserving insertion order.
///
/// Names are stored lower-cased.
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, value.into()));
    }

    /// Adds `value` for `name`, keeping earlier values.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_ascii_lowercase(), value.into()));
    }

    /// Returns the first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes every value of `name`.
    pub fn remove(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        self.entries.retain(|(existing, _)| *existing != name);
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of header values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no header is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

#[derive(Debug, Clone)]
/// Fully-resolved outbound request handed to a transport.
pub struct HttpRequest {
    /// Request verb.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers after the client's transformation pipeline.
    pub headers: Headers,
    /// Optional request body.
    pub body: Option<Bytes>,
    /// Abort signal the transport should honor when it can.
    pub signal: Option<AbortSignal>,
}

impl HttpRequest {
    /// Creates a body-less request without headers.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            signal: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raw transport response before any parsing.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Final response URL.
    pub url: String,
    /// Response headers.
    pub headers: Headers,
    /// Raw response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates an empty response with `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            url: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `200` response carrying `value` serialized as JSON.
    pub fn json<T: Serialize>(value: &T) -> Self {
        Self::new(200).with_json(value)
    }

    /// Adds a header and returns the response.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces the body and returns the response.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the body with `value` serialized as JSON and sets the content type.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Self {
        // Serializing plain data models into a Vec cannot fail; fall back to an empty body.
        self.body = serde_json::to_vec(value).map(Bytes::from).unwrap_or_default();
        self.headers.set("content-type", "application/json");
        self
    }

    /// Returns whether the status is in the `2xx` range.
    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Upload progress snapshot in bytes.
pub struct UploadProgress {
    /// Bytes sent so far.
    pub loaded: u64,
    /// Total bytes to send.
    pub total: u64,
}

/// Host fetch service performing one network round-trip per call.
///
/// Transports never retry; non-2xx responses are returned as values. Only transport-level
/// failures (network, CORS, abort) are errors.
pub trait HttpTransport {
    /// Performs a single request.
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> TransportFuture<'a, Result<HttpResponse, String>>;

    /// Performs an upload reporting progress.
    ///
    /// The default implementation reports a single completed progress event after
    /// [`HttpTransport::fetch`] resolves.
    fn upload<'a>(
        &'a self,
        request: &'a HttpRequest,
        on_progress: &'a dyn Fn(UploadProgress),
    ) -> TransportFuture<'a, Result<HttpResponse, String>> {
        Box::pin(async move {
            let total = request.body.as_ref().map_or(0, |body| body.len() as u64);
            let response = self.fetch(request).await?;
            on_progress(UploadProgress {
                loaded: total,
                total,
            });
            Ok(response)
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Transport for unsupported targets; every request fails.
pub struct NoopHttpTransport;

impl HttpTransport for NoopHttpTransport {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> TransportFuture<'a, Result<HttpResponse, String>> {
        Box::pin(async move { Err(format!("no transport available for {}", request.url)) })
    }
}

#[derive(Default)]
struct ScriptedState {
    responses: HashMap<String, VecDeque<Result<HttpResponse, String>>>,
    requests: Vec<HttpRequest>,
}

#[derive(Clone, Default)]
/// In-memory transport replaying queued responses per URL and recording every request.
///
/// Each call yields to the executor once before resolving, so concurrent callers observe the
/// request as in flight.
pub struct ScriptedTransport {
    inner: Rc<RefCell<ScriptedState>>,
}

impl ScriptedTransport {
    /// Queues a response for the next request to `url`.
    pub fn enqueue(&self, url: &str, response: HttpResponse) {
        self.inner
            .borrow_mut()
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues a transport failure for the next request to `url`.
    pub fn enqueue_error(&self, url: &str, message: &str) {
        self.inner
            .borrow_mut()
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.borrow().requests.clone()
    }

    /// Returns the number of requests issued to `url`.
    pub fn call_count(&self, url: &str) -> usize {
        self.inner
            .borrow()
            .requests
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

impl HttpTransport for ScriptedTransport {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> TransportFuture<'a, Result<HttpResponse, String>> {
        self.inner.borrow_mut().requests.push(request.clone());
        Box::pin(async move {
            YieldOnce::default().await;
            let next = self
                .inner
                .borrow_mut()
                .responses
                .get_mut(&request.url)
                .and_then(VecDeque::pop_front);
            match next {
                Some(Ok(mut response)) => {
                    if response.url.is_empty() {
                        response.url = request.url.clone();
                    }
                    Ok(response)
                }
                Some(Err(message)) => Err(message),
                None => Err(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                )),
            }
        })
    }
}

#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn headers_are_case_insensitive_and_set_replaces() {
        let mut headers = Headers::new();
        headers.append("X-Session-Id", "a");
        headers.set("x-session-id", "b");
        headers.append("Accept", "application/json");

        assert_eq!(headers.get("X-SESSION-ID"), Some("b"));
        assert_eq!(headers.len(), 2);
        headers.remove("ACCEPT");
        assert!(!headers.contains("accept"));
    }

    #[test]
    fn method_tokens_round_trip() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
            HttpMethod::Options,
            HttpMethod::Head,
        ] {
            assert_eq!(HttpMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(HttpMethod::parse("trace"), None);
    }

    #[test]
    fn scripted_transport_replays_in_order_and_records_requests() {
        let transport = ScriptedTransport::default();
        transport.enqueue("https://api/x", HttpResponse::new(503));
        transport.enqueue("https://api/x", HttpResponse::json(&json!({"ok": true})));

        let request = HttpRequest::new(HttpMethod::Get, "https://api/x");
        let first = block_on(transport.fetch(&request)).expect("first");
        let second = block_on(transport.fetch(&request)).expect("second");

        assert_eq!(first.status, 503);
        assert_eq!(first.url, "https://api/x");
        assert!(second.is_ok());
        assert_eq!(second.text(), "{\"ok\":true}");
        assert_eq!(transport.call_count("https://api/x"), 2);
    }

    #[test]
    fn scripted_transport_fails_when_script_is_exhausted() {
        let transport = ScriptedTransport::default();
        transport.enqueue_error("https://api/y", "connection reset");
        let request = HttpRequest::new(HttpMethod::Post, "https://api/y");

        assert_eq!(
            block_on(transport.fetch(&request)).expect_err("scripted error"),
            "connection reset"
        );
        let err = block_on(transport.fetch(&request)).expect_err("exhausted");
        assert!(err.contains("POST https://api/y"));
    }

    #[test]
    fn default_upload_reports_completed_progress() {
        let transport = ScriptedTransport::default();
        transport.enqueue("https://api/upload", HttpResponse::new(201));
        let mut request = HttpRequest::new(HttpMethod::Post, "https://api/upload");
        request.body = Some(Bytes::from_static(b"12345"));

        let seen = RefCell::new(Vec::new());
        let on_progress = |progress: UploadProgress| seen.borrow_mut().push(progress);
        let response = block_on(transport.upload(&request, &on_progress)).expect("upload");

        assert_eq!(response.status, 201);
        assert_eq!(
            seen.into_inner(),
            vec![UploadProgress {
                loaded: 5,
                total: 5
            }]
        );
    }
}
