//! Rate limiter contract consumed by the broadcaster and fed by the listener.
//!
//! The token accounting itself is out of scope for the core — the
//! broadcaster only ever calls [`RateLimiter::allow`] and the listener only
//! ever calls [`RateLimiter::increase_limit`]. [`TokenBucketLimiter`] is a
//! concrete implementation so the binary has something runnable; swapping
//! it out never touches the broadcaster or listener.

use std::sync::atomic::{AtomicI64, Ordering};

/// Admission-gate contract between the broadcaster and the listener.
///
/// Implementations must be safe to call concurrently at very high rates —
/// `allow` is on the hot path of every broadcaster worker.
pub trait RateLimiter: Send + Sync {
    /// Non-blocking admission check. Fails cheaply: implementations must
    /// not block the caller.
    fn allow(&self) -> bool;

    /// Raise the admission budget by `n` tokens. Called roughly once per
    /// observed block, with the block's transaction count.
    fn increase_limit(&self, n: usize);
}

/// A lock-free token bucket with no refill timer — the only source of new
/// tokens is [`TokenBucketLimiter::increase_limit`], called by the
/// listener as blocks land.
///
/// Grounded in the same atomic-counter idiom as
/// `chainbench_rpc::RpcClient`'s request-id counter and
/// `chainbench_rpc::ClientPool`'s round-robin index: a single atomic,
/// compare-exchange loop, no locks.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    budget: AtomicI64,
}

impl TokenBucketLimiter {
    /// Create a limiter starting with `initial` tokens.
    #[must_use]
    pub const fn new(initial: i64) -> Self {
        Self { budget: AtomicI64::new(initial) }
    }

    /// Current budget, for observability/tests.
    #[must_use]
    pub fn budget(&self) -> i64 {
        self.budget.load(Ordering::Relaxed)
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn allow(&self) -> bool {
        loop {
            let current = self.budget.load(Ordering::Relaxed);
            if current <= 0 {
                return false;
            }
            if self
                .budget
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn increase_limit(&self, n: usize) {
        self.budget.fetch_add(i64::try_from(n).unwrap_or(i64::MAX), Ordering::Relaxed);
    }
}

/// A limiter that never denies admission. Makes `limiter: None` semantics
/// concrete without special-casing `Option<Arc<dyn RateLimiter>>` at every
/// call site.
#[derive(Debug, Default)]
pub struct NullLimiter;

impl RateLimiter for NullLimiter {
    fn allow(&self) -> bool {
        true
    }

    fn increase_limit(&self, _n: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_denies_when_exhausted() {
        let limiter = TokenBucketLimiter::new(2);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn increase_limit_replenishes_budget() {
        let limiter = TokenBucketLimiter::new(0);
        assert!(!limiter.allow());
        limiter.increase_limit(3);
        assert_eq!(limiter.budget(), 3);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn null_limiter_always_allows() {
        let limiter = NullLimiter;
        for _ in 0..1000 {
            assert!(limiter.allow());
        }
        limiter.increase_limit(100); // no-op, must not panic
    }
}
