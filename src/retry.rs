/*!
 * Retry policy and backoff schedule for the request pipeline.
 *
 * The policy is created once at client construction and never mutated.
 * Jitter uses the thread-local random generator with one independent draw
 * per attempt, so concurrent pipelines never contend on shared state.
 */

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Immutable retry configuration owned by the request pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts for one logical call (counting the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline for a single attempt
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: Duration,

    /// Optional deadline across all attempts and backoff sleeps
    #[serde(default)]
    pub overall_timeout: Option<Duration>,

    /// Backoff delay before the second attempt
    #[serde(default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Multiplier applied to the delay for each further attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on a single backoff delay
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    /// Jitter fraction applied to each delay (0.23 means +/- 23%)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_multiplier() -> f64 {
    1.6
}

fn default_max_delay() -> Duration {
    Duration::from_secs(120)
}

fn default_jitter() -> f64 {
    0.23
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
            attempt_timeout: default_attempt_timeout(),
            overall_timeout: None,
            initial_delay: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries, for callers that want a single attempt
    pub fn no_retries() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Unjittered backoff delay before the attempt after `attempt`.
    ///
    /// Attempt counting starts at 1, so the delay after the first attempt is
    /// the initial delay and each further attempt multiplies it, clamped to
    /// the configured cap.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Backoff delay with jitter applied, one independent draw per call
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}
