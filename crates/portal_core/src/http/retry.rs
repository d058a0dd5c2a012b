//! Transient-failure retry policy.

use portal_host::HttpResponse as RawResponse;
use serde::{Deserialize, Serialize};

/// Response header overriding retry eligibility.
pub const RETRIABLE_HEADER: &str = "x-fusion-retriable";

/// Statuses retried unless the server opts out.
pub const RETRIABLE_STATUSES: [u16; 5] = [408, 424, 502, 503, 504];

/// Additive backoff bounded by cumulative retry timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries stop once the retry timeout exceeds this many milliseconds.
    pub ceiling_ms: u64,
    /// Increment added to the retry timeout before each retry.
    pub step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ceiling_ms: 20_000,
            step_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    /// Returns whether `response` is retried given the retry timeout reached so far.
    pub fn should_retry(&self, retry_timeout_ms: u64, response: &RawResponse) -> bool {
        !response.is_ok() && retry_timeout_ms <= self.ceiling_ms && is_retriable(response)
    }

    /// Returns the wait before the next attempt.
    pub fn next_timeout(&self, retry_timeout_ms: u64) -> u64 {
        retry_timeout_ms.saturating_add(self.step_ms)
    }
}

/// Returns whether the status and retry header allow a retry.
///
/// `500` is retried only with an explicit `x-fusion-retriable: true`; any status is excluded by
/// `x-fusion-retriable: false`.
pub fn is_retriable(response: &RawResponse) -> bool {
    match response
        .headers
        .get(RETRIABLE_HEADER)
        .map(|value| value.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("false") => false,
        Some("true") if response.status == 500 => true,
        _ => RETRIABLE_STATUSES.contains(&response.status),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn retriable_statuses_follow_header_contract() {
        assert!(is_retriable(&RawResponse::new(503)));
        assert!(!is_retriable(&RawResponse::new(500)));
        assert!(is_retriable(
            &RawResponse::new(500).with_header(RETRIABLE_HEADER, "true")
        ));
        assert!(!is_retriable(
            &RawResponse::new(503).with_header(RETRIABLE_HEADER, "false")
        ));
        assert!(!is_retriable(&RawResponse::new(404)));
    }

    #[test]
    fn budget_allows_seven_retries() {
        let policy = RetryPolicy::default();
        let unavailable = RawResponse::new(503);
        let mut timeout = 0;
        let mut waits = Vec::new();
        while policy.should_retry(timeout, &unavailable) {
            timeout = policy.next_timeout(timeout);
            waits.push(timeout);
        }
        assert_eq!(waits, vec![3_000, 6_000, 9_000, 12_000, 15_000, 18_000, 21_000]);
    }

    #[test]
    fn ok_responses_are_never_retried() {
        assert!(!RetryPolicy::default().should_retry(0, &RawResponse::new(200)));
    }
}
