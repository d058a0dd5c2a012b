//! Fetch transport over `reqwest`, which uses the browser `fetch` API on `wasm32`.

use futures::future::{select, Either};
use portal_host::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportFuture};
use reqwest::{Client, Method};
use tracing::debug;

#[derive(Debug, Clone)]
/// Transport performing one `reqwest` round-trip per request.
pub struct FetchTransport {
    client: Client,
}

impl Default for FetchTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Creates a transport sending through `client`.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| format!("invalid method {}: {e}", request.method))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {e}", request.url))?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => headers.append(name.as_str(), value),
                Err(_) => debug!(header = %name, "skipping non-ascii response header"),
            }
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("reading body of {} failed: {e}", request.url))?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

impl HttpTransport for FetchTransport {
    fn fetch<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> TransportFuture<'a, Result<HttpResponse, String>> {
        Box::pin(async move {
            let Some(signal) = &request.signal else {
                return self.send(request).await;
            };
            if signal.is_aborted() {
                return Err(format!("request to {} aborted", request.url));
            }
            match select(Box::pin(self.send(request)), signal.aborted()).await {
                Either::Left((result, _)) => result,
                Either::Right(_) => Err(format!("request to {} aborted", request.url)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use portal_host::{AbortController, HttpMethod};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn aborted_signal_fails_before_sending() {
        let controller = AbortController::new();
        controller.abort();
        let mut request = HttpRequest::new(HttpMethod::Get, "https://unreachable.invalid/items");
        request.signal = Some(controller.signal());

        let err = block_on(FetchTransport::new().fetch(&request)).expect_err("aborted");
        assert_eq!(err, "request to https://unreachable.invalid/items aborted");
    }
}
