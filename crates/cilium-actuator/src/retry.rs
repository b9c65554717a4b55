use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Doubling,
}

/// Bounded retry with a fixed or doubling pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub const fn doubling(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff: Backoff::Doubling,
        }
    }

    /// Same attempt count, no pauses.
    pub const fn immediate(self) -> Self {
        Self {
            delay: Duration::ZERO,
            ..self
        }
    }

    /// Pause after the given 1-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Doubling => self
                .delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
        }
    }

    /// Call `op` until it yields a value or the attempts run out.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Option<T>) -> Option<T> {
        for attempt in 1..=self.attempts {
            if let Some(value) = op(attempt) {
                return Some(value);
            }
            if attempt < self.attempts {
                let pause = self.delay_after(attempt);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
        }
        None
    }
}

/// The retry loops of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retries {
    /// Waiting for a created container to become inspectable.
    pub inspect: RetryPolicy,
    /// Waiting for another node to publish an endpoint record.
    pub endpoint: RetryPolicy,
    /// Polling Kubernetes for the pods of a created object.
    pub pods: RetryPolicy,
    /// Waiting for the Docker daemon at startup.
    pub docker_ready: RetryPolicy,
}

impl Default for Retries {
    fn default() -> Self {
        Self {
            inspect: RetryPolicy::fixed(10, Duration::from_secs(3)),
            endpoint: RetryPolicy::fixed(10, Duration::from_secs(1)),
            pods: RetryPolicy::doubling(11, Duration::from_secs(1)),
            docker_ready: RetryPolicy::doubling(5, Duration::from_secs(1)),
        }
    }
}

impl Retries {
    pub fn immediate() -> Self {
        let d = Self::default();
        Self {
            inspect: d.inspect.immediate(),
            endpoint: d.endpoint.immediate(),
            pods: d.pods.immediate(),
            docker_ready: d.docker_ready.immediate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_delays() {
        let p = RetryPolicy::doubling(5, Duration::from_secs(1));
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(2));
        assert_eq!(p.delay_after(4), Duration::from_secs(8));
    }

    #[test]
    fn stops_at_first_success() {
        let mut calls = 0;
        let got = RetryPolicy::fixed(10, Duration::ZERO).run(|attempt| {
            calls += 1;
            (attempt == 3).then_some(attempt)
        });
        assert_eq!(got, Some(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_attempts() {
        let mut calls = 0;
        let got: Option<()> = RetryPolicy::fixed(4, Duration::ZERO).run(|_| {
            calls += 1;
            None
        });
        assert!(got.is_none());
        assert_eq!(calls, 4);
    }

    #[test]
    fn immediate_keeps_attempts() {
        let r = Retries::immediate();
        assert_eq!(r.inspect.attempts, 10);
        assert!(r.inspect.delay.is_zero());
    }
}
