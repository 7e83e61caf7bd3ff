//! Retry policy with exponential backoff.
//!
//! Only rate-limit rejections and transient transport failures are retried.
//! The delay schedule is fixed (`base, 2*base, 4*base, ...`) with no jitter,
//! so identical outcome sequences always produce identical delays.

use std::time::Duration;
use tracing::debug;

use crate::common::errors::ClientError;

/// Coarse classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Transient,
    Terminal,
}

impl FailureKind {
    pub fn of(error: &ClientError) -> Self {
        match error {
            ClientError::RateLimited { .. } => FailureKind::RateLimited,
            ClientError::TransientTransport { .. } => FailureKind::Transient,
            _ => FailureKind::Terminal,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then attempt again
    Retry { delay: Duration },
    /// Retryable failure, but the attempt cap has been reached
    Exhausted,
    /// Not retryable
    Terminal,
}

/// Per-call retry bookkeeping, discarded once the call finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    last_failure: Option<FailureKind>,
    last_status: Option<u16>,
}

impl RetryContext {
    /// Mark the start of a new attempt
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Remember the outcome of the current attempt
    pub fn record_failure(&mut self, error: &ClientError) {
        self.last_failure = Some(FailureKind::of(error));
        self.last_status = error.status();
    }

    /// Attempts started so far (1 during the first attempt)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn last_failure(&self) -> Option<FailureKind> {
        self.last_failure
    }

    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }
}

/// Configuration for [`RetryPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per logical call, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Decides whether and when a failed attempt is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                ..config
            },
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    #[must_use]
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self::new(RetryConfig {
            max_attempts,
            ..self.config
        })
    }

    #[must_use]
    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self::new(RetryConfig {
            base_delay,
            ..self.config
        })
    }

    #[must_use]
    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self::new(RetryConfig {
            max_delay,
            ..self.config
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Fresh context for one logical call
    pub fn start(&self) -> RetryContext {
        RetryContext {
            attempt: 0,
            max_attempts: self.config.max_attempts,
            base_delay: self.config.base_delay,
            last_failure: None,
            last_status: None,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Full delay schedule between the attempts of one call
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.config.max_attempts).map(move |attempt| self.delay_after(attempt))
    }

    /// Decide what follows the failure of the context's current attempt
    pub fn should_retry(&self, context: &RetryContext, error: &ClientError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Terminal;
        }
        if context.attempt() >= context.max_attempts() {
            debug!(attempt = context.attempt(), "Retry budget exhausted");
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry {
            delay: self.delay_after(context.attempt()),
        }
    }
}
