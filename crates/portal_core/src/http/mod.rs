//! Resilient HTTP client, its response cache and abort scope.

pub mod abort_manager;
pub mod client;
pub mod error;
pub mod multipart;
pub mod request_init;
pub mod resource_cache;
pub mod response;
pub mod retry;

pub use abort_manager::{AbortControllerManager, ABORT_CONTROLLER_TOPIC};
pub use client::{
    AnonymousTokenAcquirer, HttpClient, SharedGet, TokenAcquirer, TokenFuture,
    REQUESTS_IN_PROGRESS_TOPIC, SESSION_ID_HEADER,
};
pub use error::{HttpClientError, HttpClientParseError, HttpClientRequestFailedError};
pub use multipart::MultipartForm;
pub use request_init::{ensure_request_init, RequestInit, REFRESH_HEADER};
pub use resource_cache::{
    CacheStatus, CachedResource, ResourceCache, TypedCachedResource, CACHE_AGE_HEADER,
    CACHE_DURATION_HEADER, CACHE_SOURCE_HEADER, RESOURCE_CACHE_TOPIC,
    RESOURCE_CACHE_UPDATE_TOPIC,
};
pub use response::{
    file_name_from_disposition, BlobFile, BlobParser, EmptyParser, HttpResponse, JsonParser,
    ListParser, ResponseParser, REFRESHABLE_HEADER,
};
pub use retry::{is_retriable, RetryPolicy, RETRIABLE_HEADER, RETRIABLE_STATUSES};
