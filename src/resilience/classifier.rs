//! # Failure Classification
//!
//! Decides whether an upstream failure is worth retrying. Classification
//! is a pure function over the closed [`UpstreamError`] taxonomy so the
//! retry decision never depends on message text. Callers with unusual
//! upstreams plug in their own [`RetryClassifier`].

use crate::error::UpstreamError;
use serde::{Deserialize, Serialize};

/// Upstream status codes the default policy treats as transient.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// What the execution loop should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Transient; retry with backoff while attempts remain
    Retry,
    /// Will not succeed if repeated; surface to the caller now
    Terminal,
    /// Caller-initiated cancellation; propagate immediately, never retry
    Cancelled,
}

/// Strategy seam for retryable-vs-terminal decisions.
pub trait RetryClassifier: Send + Sync {
    fn classify(&self, error: &UpstreamError) -> FailureDisposition;

    /// Classifier name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Default policy: transient network/timeout failures and the retryable
/// status codes are retried; cancellation never; everything else terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn classify(&self, error: &UpstreamError) -> FailureDisposition {
        match error {
            UpstreamError::Network(_) | UpstreamError::Timeout { .. } => {
                FailureDisposition::Retry
            }
            UpstreamError::Status { code } if RETRYABLE_STATUS_CODES.contains(code) => {
                FailureDisposition::Retry
            }
            UpstreamError::Cancelled => FailureDisposition::Cancelled,
            UpstreamError::Status { .. }
            | UpstreamError::Invalid(_)
            | UpstreamError::Other(_) => FailureDisposition::Terminal,
        }
    }

    fn name(&self) -> &'static str {
        "default"
    }
}
