//! Shared HTTP helpers: bounded retry and common header sets.

use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER};
use tokio_util::sync::CancellationToken;

use crate::platform::ScrapeError;
use crate::stealth::StealthTransport;

const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Send a request through the stealth transport with bounded retries.
///
/// Transient transport errors and 5xx responses are retried up to
/// `max_retries` times with a linear backoff (500ms, 1s, 1.5s, ...).
/// Policy blocks and cancellation are terminal and returned immediately.
/// When every attempt yields a 5xx, the last response is returned as-is so
/// the caller can inspect the status.
pub async fn send_with_retry(
    transport: &StealthTransport,
    request: &reqwest::Request,
    max_retries: u32,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, ScrapeError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match transport.execute(request, cancel).await {
            Ok(resp) => {
                if !is_retryable_status(resp.status()) || attempt > max_retries {
                    return Ok(resp);
                }
                log::debug!(
                    "retrying {} after status {} (attempt {attempt})",
                    request.url(),
                    resp.status()
                );
            }
            Err(err) => {
                let err = ScrapeError::from(err);
                if !err.is_transient() || attempt > max_retries {
                    return Err(err);
                }
                log::debug!("retrying {} after {err} (attempt {attempt})", request.url());
            }
        }

        backoff(attempt, cancel).await?;
    }
}

async fn backoff(attempt: u32, cancel: &CancellationToken) -> Result<(), ScrapeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Canceled),
        _ = tokio::time::sleep(RETRY_BACKOFF_STEP * attempt) => Ok(()),
    }
}

fn is_retryable_status(status: http::StatusCode) -> bool {
    status.is_server_error()
}

/// Header set for fetching public marketplace pages. The stealth transport
/// fills in the user-agent and the rest of the browser identity.
pub fn browser_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-cache"),
    );
    h.insert(
        HeaderName::from_static("pragma"),
        HeaderValue::from_static("no-cache"),
    );
    h
}

/// Header set for Tokopedia's internal GraphQL gateway. Without the
/// `x-source`/`x-tkpd-lite-service` pair the gateway rejects the call.
pub fn graphql_headers(referer: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    h.insert(ORIGIN, HeaderValue::from_static("https://www.tokopedia.com"));
    if let Ok(value) = HeaderValue::from_str(referer) {
        h.insert(REFERER, value);
    }
    h.insert(
        HeaderName::from_static("x-source"),
        HeaderValue::from_static("tokopedia-lite"),
    );
    h.insert(
        HeaderName::from_static("x-tkpd-lite-service"),
        HeaderValue::from_static("zeus"),
    );
    h.insert(
        HeaderName::from_static("x-device"),
        HeaderValue::from_static("desktop"),
    );
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_errors_are_retryable() {
        assert!(is_retryable_status(http::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(http::StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(http::StatusCode::OK));
        assert!(!is_retryable_status(http::StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(http::StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn graphql_headers_carry_the_gateway_markers() {
        let h = graphql_headers("https://www.tokopedia.com/search?q=x");
        assert_eq!(h[CONTENT_TYPE], "application/json");
        assert_eq!(h["x-source"], "tokopedia-lite");
        assert_eq!(h["x-tkpd-lite-service"], "zeus");
        assert_eq!(h[REFERER], "https://www.tokopedia.com/search?q=x");
    }

    #[tokio::test]
    async fn backoff_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        match backoff(1, &cancel).await {
            Err(ScrapeError::Canceled) => {}
            other => panic!("expected Canceled, got {other:?}"),
        }
    }
}
