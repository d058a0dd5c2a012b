//! The single choke point for outbound API calls.
//!
//! Every request runs the same pipeline: session id, JSON accept header, bearer token from the
//! [`TokenAcquirer`], and the active abort signal. Non-OK responses are retried per
//! [`RetryPolicy`]; GETs are de-duplicated across every client on the hub and feed the
//! [`ResourceCache`].

use std::{collections::HashMap, rc::Rc, time::Duration};

use futures::future::{select, Either, FutureExt, LocalBoxFuture, Shared};
use portal_host::{
    AbortSignal, HostServices, HttpMethod, HttpRequest, HttpResponse as RawResponse,
    HttpTransport, TelemetryLogger, Timer, UploadProgress,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    abort_manager::AbortControllerManager,
    error::{HttpClientError, HttpClientParseError, HttpClientRequestFailedError},
    multipart::MultipartForm,
    request_init::{ensure_request_init, RequestInit},
    resource_cache::ResourceCache,
    response::{
        parse_json_value, BlobFile, BlobParser, EmptyParser, HttpResponse, JsonParser,
        ResponseParser, REFRESHABLE_HEADER,
    },
    retry::RetryPolicy,
};
use crate::{distributed_state::DistributedState, event_hub::EventHub};

/// Topic of the shared in-flight GET map.
pub const REQUESTS_IN_PROGRESS_TOPIC: &str = "RequestsInProgress";
/// Per-client session header.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Boxed future returned by [`TokenAcquirer`].
pub type TokenFuture<'a> = LocalBoxFuture<'a, Result<Option<String>, String>>;

/// Resolves the bearer token for a request URL.
pub trait TokenAcquirer {
    /// Returns a token for `resource`, or `None` when the request should go out anonymous.
    fn acquire_token_async<'a>(&'a self, resource: &'a str) -> TokenFuture<'a>;
}

/// Token source for anonymous clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousTokenAcquirer;

impl TokenAcquirer for AnonymousTokenAcquirer {
    fn acquire_token_async<'a>(&'a self, _resource: &'a str) -> TokenFuture<'a> {
        Box::pin(async { Ok(None) })
    }
}

/// Shared outcome of one de-duplicated GET.
pub type SharedGet = Shared<LocalBoxFuture<'static, Result<HttpResponse<Value>, HttpClientError>>>;

struct ClientInner {
    session_id: Uuid,
    transport: Rc<dyn HttpTransport>,
    timer: Rc<dyn Timer>,
    telemetry: Rc<dyn TelemetryLogger>,
    tokens: Rc<dyn TokenAcquirer>,
    abort: AbortControllerManager,
    cache: ResourceCache,
    in_progress: DistributedState<HashMap<String, SharedGet>>,
    retry: RetryPolicy,
}

/// Resilient HTTP client. Clones share one session.
#[derive(Clone)]
pub struct HttpClient {
    inner: Rc<ClientInner>,
}

impl HttpClient {
    /// Creates a client on `hub`, joining the shared cache, abort scope and in-flight map.
    pub fn new(
        host: &HostServices,
        hub: &EventHub,
        tokens: Rc<dyn TokenAcquirer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                session_id: Uuid::new_v4(),
                transport: Rc::clone(&host.transport),
                timer: Rc::clone(&host.timer),
                telemetry: Rc::clone(&host.telemetry),
                tokens,
                abort: AbortControllerManager::new(hub),
                cache: ResourceCache::new(hub),
                in_progress: DistributedState::new(REQUESTS_IN_PROGRESS_TOPIC, HashMap::new(), hub),
                retry,
            }),
        }
    }

    /// Returns the session id sent with every request.
    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    /// Returns the response cache this client feeds.
    pub fn resource_cache(&self) -> &ResourceCache {
        &self.inner.cache
    }

    /// Returns the abort scope whose signal is attached to requests.
    pub fn abort_manager(&self) -> &AbortControllerManager {
        &self.inner.abort
    }

    /// Returns the URLs with a GET in flight.
    pub fn requests_in_progress(&self) -> Vec<String> {
        self.inner
            .in_progress
            .with_state(|requests| requests.keys().cloned().collect())
    }

    /// Issues a de-duplicated GET and decodes the body as `T`.
    ///
    /// Concurrent GETs for the same URL share one round-trip and one outcome.
    ///
    /// # Errors
    ///
    /// Returns the shared request error, or [`HttpClientError::Parse`] when the body does not
    /// match `T`. Parse failures are reported to telemetry.
    pub async fn get_async<T: DeserializeOwned>(
        &self,
        url: &str,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<T>, HttpClientError> {
        let response = self.get_shared(url, init).await?;
        match serde_json::from_value(response.data.clone()) {
            Ok(data) => Ok(response.map(|_| data)),
            Err(err) => {
                let err = HttpClientError::from(HttpClientParseError {
                    url: response.url.clone(),
                    status: response.status,
                    message: err.to_string(),
                    body: response.data.to_string(),
                });
                self.inner.telemetry.track_exception(
                    &err.to_string(),
                    &[("url", url), ("method", HttpMethod::Get.as_str())],
                );
                Err(err)
            }
        }
    }

    /// Returns the in-flight GET for `url`, starting one when none is running.
    pub fn get_shared(&self, url: &str, init: Option<RequestInit>) -> SharedGet {
        if let Some(existing) = self
            .inner
            .in_progress
            .with_state(|requests| requests.get(url).cloned())
        {
            debug!(url, "joining in-flight GET");
            return existing;
        }

        let inner = Rc::clone(&self.inner);
        let key = url.to_string();
        let request = async move {
            inner.cache.set_is_fetching_async(&key).await;
            let result = inner
                .execute(
                    HttpMethod::Get,
                    &key,
                    init.unwrap_or_default(),
                    &JsonParser::<Value>::default(),
                    None,
                )
                .await;
            match &result {
                Ok(response) => inner.cache.update_async(&key, response).await,
                Err(_) => inner.cache.clear_is_fetching_async(&key).await,
            }
            inner.in_progress.update(|requests| {
                requests.remove(&key);
            });
            result
        }
        .boxed_local()
        .shared();

        self.inner.in_progress.update(|requests| {
            requests.insert(url.to_string(), request.clone());
        });
        request
    }

    /// Issues a POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn post_async<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<T>, HttpClientError> {
        self.send_json(HttpMethod::Post, url, body, init).await
    }

    /// Issues a PUT with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn put_async<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<T>, HttpClientError> {
        self.send_json(HttpMethod::Put, url, body, init).await
    }

    /// Issues a PATCH with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn patch_async<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<T>, HttpClientError> {
        self.send_json(HttpMethod::Patch, url, body, init).await
    }

    /// Issues a DELETE, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn delete_async(
        &self,
        url: &str,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<()>, HttpClientError> {
        self.fetch_async(HttpMethod::Delete, url, init, EmptyParser).await
    }

    /// Issues a HEAD.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn head_async(
        &self,
        url: &str,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<()>, HttpClientError> {
        self.fetch_async(HttpMethod::Head, url, init, EmptyParser).await
    }

    /// Issues an OPTIONS and returns the methods listed in `Allow`.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn options_async(
        &self,
        url: &str,
        init: Option<RequestInit>,
    ) -> Result<Vec<HttpMethod>, HttpClientError> {
        let response = self
            .fetch_async(HttpMethod::Options, url, init, EmptyParser)
            .await?;
        Ok(response
            .headers
            .get("allow")
            .map(|allow| allow.split(',').filter_map(HttpMethod::parse).collect())
            .unwrap_or_default())
    }

    /// Returns whether `method` is listed in the `Allow` header for `url`.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn is_allowed_async(
        &self,
        url: &str,
        method: HttpMethod,
    ) -> Result<bool, HttpClientError> {
        Ok(self.options_async(url, None).await?.contains(&method))
    }

    /// Downloads a file.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn get_blob_async(
        &self,
        url: &str,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<BlobFile>, HttpClientError> {
        self.fetch_async(HttpMethod::Get, url, init, BlobParser).await
    }

    /// Posts a JSON body and downloads the file returned.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn post_for_blob_async<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<BlobFile>, HttpClientError> {
        let init = json_init(url, body, init)?;
        self.fetch_async(HttpMethod::Post, url, Some(init), BlobParser)
            .await
    }

    /// Posts a multipart form, reporting upload progress.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn upload_async<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &MultipartForm,
        on_progress: impl Fn(UploadProgress),
    ) -> Result<HttpResponse<T>, HttpClientError> {
        let init = RequestInit::new()
            .with_header("content-type", form.content_type())
            .with_body(form.to_body());
        let on_progress: &dyn Fn(UploadProgress) = &on_progress;
        self.inner
            .execute(
                HttpMethod::Post,
                url,
                init,
                &JsonParser::<T>::default(),
                Some(on_progress),
            )
            .await
    }

    /// Runs the full pipeline for any verb with a caller-chosen parser. Not de-duplicated.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn fetch_async<P: ResponseParser>(
        &self,
        method: HttpMethod,
        url: &str,
        init: Option<RequestInit>,
        parser: P,
    ) -> Result<HttpResponse<P::Output>, HttpClientError> {
        let init = ensure_request_init(init, |init| RequestInit {
            method: init.method.or(Some(method)),
            ..init
        });
        self.inner.execute(method, url, init, &parser, None).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        body: &B,
        init: Option<RequestInit>,
    ) -> Result<HttpResponse<T>, HttpClientError> {
        let init = json_init(url, body, init)?;
        self.fetch_async(method, url, Some(init), JsonParser::<T>::default())
            .await
    }
}

fn json_init<B: Serialize + ?Sized>(
    url: &str,
    body: &B,
    init: Option<RequestInit>,
) -> Result<RequestInit, HttpClientError> {
    init.unwrap_or_default()
        .with_json(body)
        .map_err(|err| HttpClientError::Body {
            url: url.to_string(),
            message: err.to_string(),
        })
}

impl ClientInner {
    async fn execute<P: ResponseParser>(
        &self,
        method: HttpMethod,
        url: &str,
        init: RequestInit,
        parser: &P,
        on_progress: Option<&dyn Fn(UploadProgress)>,
    ) -> Result<HttpResponse<P::Output>, HttpClientError> {
        let result = self.execute_once(method, url, &init, parser, on_progress).await;
        if let Err(err) = &result {
            if err.is_reportable() {
                self.telemetry.track_exception(
                    &err.to_string(),
                    &[("url", url), ("method", method.as_str())],
                );
            }
        }
        result
    }

    async fn execute_once<P: ResponseParser>(
        &self,
        method: HttpMethod,
        url: &str,
        init: &RequestInit,
        parser: &P,
        on_progress: Option<&dyn Fn(UploadProgress)>,
    ) -> Result<HttpResponse<P::Output>, HttpClientError> {
        let request = self.transform(method, url, init).await?;
        let response = self.fetch_with_retry(&request, on_progress).await?;
        let data = parser.parse(&response)?;
        let refresh_request = response
            .headers
            .contains(REFRESHABLE_HEADER)
            .then(|| init.to_refresh_request());
        Ok(HttpResponse {
            data,
            status: response.status,
            url: response.url,
            headers: response.headers,
            refresh_request,
        })
    }

    async fn transform(
        &self,
        method: HttpMethod,
        url: &str,
        init: &RequestInit,
    ) -> Result<HttpRequest, HttpClientError> {
        let mut request = HttpRequest::new(init.method.unwrap_or(method), url);
        request.headers = init.headers.clone();
        request.body = init.body.clone();

        request
            .headers
            .set(SESSION_ID_HEADER, self.session_id.to_string());
        if !request.headers.contains("accept") {
            request.headers.set("accept", "application/json");
        }

        let token = self
            .tokens
            .acquire_token_async(url)
            .await
            .map_err(|message| HttpClientError::Auth {
                url: url.to_string(),
                message,
            })?;
        if let Some(token) = token {
            request
                .headers
                .set("authorization", format!("Bearer {token}"));
        }

        request.signal = init
            .signal
            .clone()
            .or_else(|| self.abort.get_current_signal());
        Ok(request)
    }

    async fn fetch_with_retry(
        &self,
        request: &HttpRequest,
        on_progress: Option<&dyn Fn(UploadProgress)>,
    ) -> Result<RawResponse, HttpClientError> {
        let mut retry_timeout = 0_u64;
        let mut waited = 0_u64;
        loop {
            if request.signal.as_ref().is_some_and(AbortSignal::is_aborted) {
                return Err(HttpClientError::Aborted {
                    url: request.url.clone(),
                });
            }

            let attempt = match on_progress {
                Some(on_progress) => self.transport.upload(request, on_progress).await,
                None => self.transport.fetch(request).await,
            };
            let response = attempt.map_err(|message| HttpClientError::Network {
                url: request.url.clone(),
                message,
            })?;
            if response.is_ok() {
                return Ok(response);
            }
            if !self.retry.should_retry(retry_timeout, &response) {
                return Err(request_failed(&request.url, response).into());
            }

            retry_timeout = self.retry.next_timeout(retry_timeout);
            waited += retry_timeout;
            warn!(
                url = %request.url,
                status = response.status,
                retry_in_ms = retry_timeout,
                waited_ms = waited,
                "retrying transient failure"
            );
            if self.wait_or_abort(retry_timeout, request.signal.as_ref()).await {
                return Err(HttpClientError::Aborted {
                    url: request.url.clone(),
                });
            }
        }
    }

    /// Returns `true` when `signal` fired before the wait elapsed.
    async fn wait_or_abort(&self, millis: u64, signal: Option<&AbortSignal>) -> bool {
        let sleep = self.timer.sleep(Duration::from_millis(millis));
        match signal {
            None => {
                sleep.await;
                false
            }
            Some(signal) => matches!(select(sleep, signal.aborted()).await, Either::Right(_)),
        }
    }
}

fn request_failed(url: &str, response: RawResponse) -> HttpClientRequestFailedError {
    let body = parse_json_value(&response)
        .ok()
        .filter(|body| !body.is_null());
    HttpClientRequestFailedError {
        status: response.status,
        url: if response.url.is_empty() {
            url.to_string()
        } else {
            response.url
        },
        response: body,
        headers: response.headers,
    }
}
