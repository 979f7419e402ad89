use std::time::{Duration, Instant};

/// The point in time one bus transaction has to finish by.
///
/// A transaction computes its deadline once and hands the same value to every step, so nested loops never
/// stretch the total wait beyond the caller's timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Starts a deadline `timeout` from now. A zero timeout never expires.
    pub fn after(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::never()
        } else {
            Self {
                expires_at: Instant::now().checked_add(timeout),
            }
        }
    }

    pub const fn never() -> Self {
        Self { expires_at: None }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Time left before expiry; `None` if the deadline never expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}
