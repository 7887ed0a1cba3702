//! Exponential backoff schedule for rate-limited provider calls.

use std::time::Duration;

use crate::config::BackoffPolicy;

impl BackoffPolicy {
    /// Wait applied after the `failed_attempt`-th rate-limited attempt (1-based).
    ///
    /// `initial * multiplier^(n-1)`, capped at `max_wait`.
    pub fn wait_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(64) as i32;
        let secs = self.initial_wait.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_wait.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_wait
        }
    }

    /// Waits actually slept for a call that is rate limited on every attempt.
    ///
    /// Nothing is slept after the final attempt, so there is one wait fewer
    /// than attempts.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(move |attempt| self.wait_after(attempt))
    }

    /// Upper bound on time spent sleeping across all retries of one call.
    pub fn total_wait(&self) -> Duration {
        self.schedule().sum()
    }
}
