use atelier_core::{AtelierError, FailureKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configures retry behaviour for transient invocation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
    /// Upper bound of the uniform jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// A policy with zero delays, for tests that exercise the retry loop.
    pub fn instant() -> Self {
        Self {
            backoff_base_ms: 0,
            backoff_max_ms: 0,
            jitter_ms: 0,
        }
    }

    /// Delay before the retry following `attempt` (zero-based): exponential
    /// growth capped at `backoff_max_ms`, plus uniform jitter.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let base = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.backoff_max_ms);
        if self.jitter_ms == 0 {
            return base;
        }
        base + rand::thread_rng().gen_range(0..=self.jitter_ms)
    }
}

/// Classifies an invocation failure as transient or permanent.
///
/// Timeouts, rate limits, and 5xx-equivalent provider failures are
/// transient and worth retrying. Invalid input and policy rejections are
/// permanent: retrying cannot succeed.
pub fn classify_failure(err: &AtelierError) -> FailureKind {
    if let AtelierError::Invocation { kind, .. } = err {
        return *kind;
    }

    let lower = err.to_string().to_lowercase();

    if lower.contains("400")
        || lower.contains("invalid input")
        || lower.contains("policy")
        || lower.contains("content rejected")
    {
        return FailureKind::Permanent;
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("overloaded")
    {
        return FailureKind::Transient;
    }

    // Unknown provider failures default to permanent so a broken request
    // cannot burn the whole retry budget.
    FailureKind::Permanent
}
