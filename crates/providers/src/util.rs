//! Shared utility functions for provider adapters.

use agentrt_domain::{Error, Result, TraceEvent};
use std::time::Duration;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    Error::transport(e.to_string(), e.is_timeout() || e.is_connect())
}

/// Resolve an API key from the named environment variable.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    std::env::var(env_var)
        .map_err(|_| Error::Config(format!("environment variable '{env_var}' not set")))
}

/// Base delay doubled per attempt: 200ms, 400ms, 800ms, ...
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Sends an HTTP request built fresh by `build` on every attempt, retrying
/// a 429 or 5xx response (or a connect/timeout failure) with exponential
/// backoff until `max_retries` is exhausted. `build` is called again on
/// every attempt since a sent [`reqwest::RequestBuilder`] can't be reused.
///
/// Any other status, or a non-retryable transport error, returns
/// immediately without consuming a retry.
pub(crate) async fn send_with_retry<F>(
    mut build: F,
    max_retries: u32,
    agent_id: &str,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let outcome = match build().send().await {
            Ok(resp) => classify_response(resp).await,
            Err(e) => Err(from_reqwest(e)),
        };

        match outcome {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let retryable = matches!(&e, Error::Transport { retryable: true, .. });
                if !retryable || attempt >= max_retries {
                    return Err(e);
                }
                attempt += 1;
                TraceEvent::ModelRetried {
                    agent_id: agent_id.to_string(),
                    attempt,
                    reason: e.to_string(),
                }
                .emit();
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
        }
    }
}

/// A successful status passes the response through untouched for the
/// caller to read; any other status is resolved into a transport error,
/// retryable only for 429 and 5xx.
async fn classify_response(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retryable = is_retryable_status(status);
    let text = resp.text().await.unwrap_or_default();
    Err(Error::transport(format!("HTTP {}: {text}", status.as_u16()), retryable))
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_reads_env_var() {
        let var_name = "AGENTRT_TEST_RESOLVE_KEY_1234";
        std::env::set_var(var_name, "secret-value");
        assert_eq!(resolve_api_key(var_name).unwrap(), "secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_is_config_error() {
        let err = resolve_api_key("AGENTRT_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn client_errors_other_than_429_are_not_retryable() {
        assert!(!is_retryable_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_error() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = send_with_retry(
            || {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                reqwest::Client::new().post("http://127.0.0.1:0/definitely-unreachable")
            },
            2,
            "agent-1",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
