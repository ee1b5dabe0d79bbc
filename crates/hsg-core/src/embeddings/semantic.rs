//! Semantic (provider-backed) embedding over HTTP.
//! Retry/backoff policy: 3 attempts, exponential backoff from 1s, no added
//! jitter, so retry timing stays assertable in tests.

use super::{EmbeddingError, EmbeddingProvider};
use crate::model::resize;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

/// Retry budget.
const MAX_ATTEMPTS: u32 = 3;
/// Exponential backoff base.
const INITIAL_RETRY_DELAY_MS: u64 = 1_000;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Exponential backoff for attempt `attempt` (0-indexed), honoring a
/// server-supplied `Retry-After` header when present.
fn retry_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d;
    }
    Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt))
}

fn parse_retry_after(header: Option<&str>) -> Option<Duration> {
    let header = header?;
    if let Ok(secs) = header.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date form is not parsed here, only the numeric-seconds case.
    None
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// An HTTP-backed semantic embedding provider. Requests are serialized
/// through `in_flight` since the reference endpoint this targets enforces a
/// single in-flight request per caller; callers still invoke `embed`/
/// `embed_batch` concurrently (one call per sector), they just queue here
/// rather than firing overlapping HTTP requests.
pub struct SemanticHttpProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    dim: usize,
    model_name: String,
    in_flight: Mutex<()>,
}

impl SemanticHttpProvider {
    pub fn new(endpoint: impl Into<String>, dim: usize, model_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            dim,
            model_name: model_name.into(),
            in_flight: Mutex::new(()),
        }
    }

    fn call(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let _guard = self.in_flight.lock().expect("poisoned");
        let mut last_err: Option<EmbeddingError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": texts, "model": self.model_name }))
            .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbedResponse = resp
                        .json()
                        .map_err(|e| EmbeddingError::Request(e.to_string()))?;
                        return Ok(parsed.embeddings);
                    }
                    let retry_after = parse_retry_after(
                        resp.headers().get("retry-after").and_then(|v| v.to_str().ok()),
                    );
                    if status.as_u16() == 429 {
                        last_err = Some(EmbeddingError::RateLimited {
                                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
                        });
                    } else {
                        last_err = Some(EmbeddingError::Request(format!("status {status}")));
                    }
                    if !is_retryable_status(status.as_u16()) || attempt + 1 == MAX_ATTEMPTS {
                        break;
                    }
                    std::thread::sleep(retry_delay(attempt, retry_after));
                }
                Err(e) => {
                    last_err = Some(EmbeddingError::Request(e.to_string()));
                    if attempt + 1 == MAX_ATTEMPTS {
                        break;
                    }
                    std::thread::sleep(retry_delay(attempt, None));
                }
            }
        }
        Err(EmbeddingError::RetriesExhausted(
                last_err.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".into()),
        ))
    }
}

impl EmbeddingProvider for SemanticHttpProvider {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let raw = self.call(texts)?;
        Ok(raw.into_iter().map(|v| resize(&v, self.dim)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_cover_429_and_5xx() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay(0, None), Duration::from_millis(1_000));
        assert_eq!(retry_delay(1, None), Duration::from_millis(2_000));
        assert_eq!(retry_delay(2, None), Duration::from_millis(4_000));
    }

    #[test]
    fn retry_after_header_takes_precedence() {
        let d = retry_delay(0, Some(Duration::from_secs(5)));
        assert_eq!(d, Duration::from_secs(5));
    }

    #[test]
    fn parses_numeric_retry_after() {
        assert_eq!(parse_retry_after(Some("7")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(None), None);
    }
}
