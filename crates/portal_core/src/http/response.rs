//! Parsed responses and the body parsers the client accepts.

use std::marker::PhantomData;

use bytes::Bytes;
use portal_host::{Headers, HttpResponse as RawResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{error::HttpClientParseError, request_init::RequestInit};
use crate::storage::parse_with_dates;

/// Response header marking a response as refreshable.
pub const REFRESHABLE_HEADER: &str = "x-pp-is-refreshable";

/// Parsed response returned by the client.
#[derive(Debug, Clone)]
pub struct HttpResponse<T> {
    /// Parsed body.
    pub data: T,
    /// HTTP status.
    pub status: u16,
    /// Final URL.
    pub url: String,
    /// Response headers.
    pub headers: Headers,
    /// Options that re-issue the request as a cache-bypassing refresh, present when the
    /// response was marked refreshable.
    pub refresh_request: Option<RequestInit>,
}

impl<T> HttpResponse<T> {
    /// Replaces the body, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HttpResponse<U> {
        HttpResponse {
            data: f(self.data),
            status: self.status,
            url: self.url,
            headers: self.headers,
            refresh_request: self.refresh_request,
        }
    }
}

/// Converts a raw body into a typed value.
pub trait ResponseParser {
    /// Parsed body type.
    type Output;

    /// Parses `response`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientParseError`] when the body does not have the expected shape.
    fn parse(&self, response: &RawResponse) -> Result<Self::Output, HttpClientParseError>;
}

fn parse_error(response: &RawResponse, message: impl ToString) -> HttpClientParseError {
    HttpClientParseError {
        url: response.url.clone(),
        status: response.status,
        message: message.to_string(),
        body: response.text(),
    }
}

/// Parses the body as JSON with date revival; an empty body reads as `null`.
pub fn parse_json_value(response: &RawResponse) -> Result<Value, HttpClientParseError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let raw = std::str::from_utf8(&response.body).map_err(|err| parse_error(response, err))?;
    parse_with_dates(raw).map_err(|err| parse_error(response, err))
}

/// Strict JSON parser into `T`.
pub struct JsonParser<T>(PhantomData<fn() -> T>);

impl<T> Default for JsonParser<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: DeserializeOwned> ResponseParser for JsonParser<T> {
    type Output = T;

    fn parse(&self, response: &RawResponse) -> Result<T, HttpClientParseError> {
        let value = parse_json_value(response)?;
        serde_json::from_value(value).map_err(|err| parse_error(response, err))
    }
}

/// Tolerant list parser: any body that is not a JSON array of `T` yields an empty list.
pub struct ListParser<T>(PhantomData<fn() -> T>);

impl<T> Default for ListParser<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: DeserializeOwned> ResponseParser for ListParser<T> {
    type Output = Vec<T>;

    fn parse(&self, response: &RawResponse) -> Result<Vec<T>, HttpClientParseError> {
        let parsed = parse_json_value(response)
            .ok()
            .and_then(|value| serde_json::from_value::<Vec<T>>(value).ok());
        Ok(parsed.unwrap_or_else(|| {
            debug!(url = %response.url, "list body not parseable; returning empty list");
            Vec::new()
        }))
    }
}

/// Parser ignoring the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyParser;

impl ResponseParser for EmptyParser {
    type Output = ();

    fn parse(&self, _response: &RawResponse) -> Result<(), HttpClientParseError> {
        Ok(())
    }
}

/// Binary download with the file name announced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFile {
    /// File name from `Content-Disposition`, quotes stripped.
    pub file_name: Option<String>,
    /// Content type header.
    pub content_type: Option<String>,
    /// Raw bytes.
    pub data: Bytes,
}

/// Parser keeping the raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobParser;

impl ResponseParser for BlobParser {
    type Output = BlobFile;

    fn parse(&self, response: &RawResponse) -> Result<BlobFile, HttpClientParseError> {
        Ok(BlobFile {
            file_name: response
                .headers
                .get("content-disposition")
                .and_then(file_name_from_disposition),
            content_type: response.headers.get("content-type").map(str::to_string),
            data: response.body.clone(),
        })
    }
}

/// Extracts `filename=` from a `Content-Disposition` value, stripping wrapping quotes.
pub fn file_name_from_disposition(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
