use anyhow::{Error, anyhow};
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// User agent sent to upstream price services.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; longterm/0.1)";

/// Start of a window of `days` days ending at `end`.
pub fn lookback_start(end: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, Error> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|window| end.checked_sub_signed(window))
        .ok_or_else(|| anyhow!("Lookback of {days} days is out of range"))
}

/// Retries a request while it fails at the transport level.
///
/// # Parameters
/// - `operation`: Closure returning the request future
/// - `retries`: Extra attempts after the first one
/// - `delay_ms`: Base delay, multiplied by the attempt number
///
/// HTTP status errors and body decoding failures are returned immediately;
/// only connect, timeout and request-building failures are retried.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                let transient = err.is_connect() || err.is_timeout();
                if !transient || attempt > retries {
                    return Err(err.into());
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    retries + 1,
                    err
                );
                tokio::time::sleep(Duration::from_millis(delay_ms * attempt as u64)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_lookback_start() {
        let end = DateTime::parse_from_rfc3339("2025-01-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let start = lookback_start(end, 365).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-11T00:00:00+00:00");

        let err = lookback_start(end, u32::MAX).unwrap_err();
        assert_eq!(err.to_string(), "Lookback of 4294967295 days is out of range");
    }

    #[tokio::test]
    async fn test_connect_errors_are_retried() {
        // Grab a free port, then close it so connections are refused
        let url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let client = reqwest::Client::new();
        let attempts = AtomicUsize::new(0);

        let result = with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get(&url).send()
            },
            2,
            1,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_successful_response_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let response = with_retry(|| client.get(mock_server.uri()).send(), 3, 1)
            .await
            .unwrap();

        // Status errors are the caller's concern
        assert_eq!(response.status().as_u16(), 503);
    }
}
