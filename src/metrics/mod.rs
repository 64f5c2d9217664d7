//! Prometheus metrics.
//!
//! Three series, labeled by key owner and model:
//!
//! | Name | Kind |
//! |------|------|
//! | `gateway_requests_total{owner,model,status_code}` | counter |
//! | `gateway_request_duration_seconds{owner,model}` | histogram |
//! | `gateway_tokens_used_total{owner,model,token_type}` | counter |
//!
//! Recording is fire-and-forget: a missing or broken recorder never affects
//! a request. Cached responses replay their stored `usage`, so token
//! counters move on every hit as well as on every miss.

use std::sync::OnceLock;
use std::time::Duration;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

use crate::api::Usage;

/// Requests counter name.
pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
/// Latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
/// Token counter name.
pub const TOKENS_USED_TOTAL: &str = "gateway_tokens_used_total";

/// Latency buckets in seconds (an implicit `+Inf` bucket is always added).
pub const DURATION_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 15.0, 20.0, 30.0,
];

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics initialization failures.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Bucket configuration was rejected.
    #[error("metrics setup failed: {source}")]
    Setup {
        /// Underlying failure.
        #[source]
        source: BuildError,
    },

    /// Installing the global recorder failed.
    #[error("failed to install metrics recorder: {source}")]
    Install {
        /// Underlying failure.
        #[source]
        source: BuildError,
    },
}

/// Installs the Prometheus recorder. Idempotent: repeated calls after a
/// successful install are no-ops (the recorder is process-global).
pub fn init() -> Result<(), MetricsError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            DURATION_BUCKETS,
        )
        .map_err(|e| MetricsError::Setup { source: e })?
        .install_recorder()
        .map_err(|e| MetricsError::Install { source: e })?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

/// Renders the exposition text. Empty until [`init`] has run.
pub fn render() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Records one terminated request: count and wall time.
pub fn record_request(owner: &str, model: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "owner" => owner.to_string(),
        "model" => model.to_string(),
        "status_code" => status_code.to_string(),
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "owner" => owner.to_string(),
        "model" => model.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Records the token usage of a returned response.
pub fn record_token_usage(owner: &str, model: &str, usage: &Usage) {
    for (token_type, amount) in [
        ("prompt", usage.prompt_tokens),
        ("completion", usage.completion_tokens),
        ("total", usage.total_tokens),
    ] {
        counter!(
            TOKENS_USED_TOTAL,
            "owner" => owner.to_string(),
            "model" => model.to_string(),
            "token_type" => token_type,
        )
        .increment(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_is_idempotent_and_records() {
        init().expect("first init");
        init().expect("second init is a no-op");

        record_request("alice", "gpt-4o", 200, Duration::from_millis(120));
        record_token_usage("alice", "gpt-4o", &Usage::new(10, 5));

        let text = render();
        assert!(text.contains(REQUESTS_TOTAL));
        assert!(text.contains(REQUEST_DURATION_SECONDS));
        assert!(text.contains(TOKENS_USED_TOTAL));
        assert!(text.contains("owner=\"alice\""));
        assert!(text.contains("token_type=\"total\""));
    }

    #[test]
    #[serial]
    fn test_recording_without_init_does_not_panic() {
        // The metrics crate falls back to a no-op recorder.
        record_request("bob", "gpt-4o", 500, Duration::from_millis(1));
        record_token_usage("bob", "gpt-4o", &Usage::default());
    }
}
