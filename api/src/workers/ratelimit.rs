use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum wall-clock gap enforced between two requests to the same domain, across the whole
/// worker pool.
pub const DOMAIN_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// Per-domain last-contact map shared by every worker: a `Mutex<HashMap<String, Instant>>` plus
/// an async `wait()`, generalized here from a fixed crawl delay to a uniform 2s domain delay.
pub struct DomainLimiter {
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl DomainLimiter {
    pub fn new() -> Self {
        DomainLimiter {
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    pub async fn wait(&self, domain: &str) {
        loop {
            let sleep_for = {
                let mut guard = self.next_allowed.lock().await;
                let now = Instant::now();
                match guard.get(domain) {
                    Some(next) if *next > now => Some(*next - now),
                    _ => {
                        guard.insert(domain.to_string(), now + DOMAIN_REQUEST_DELAY);
                        None
                    }
                }
            };

            match sleep_for {
                Some(duration) => tokio::time::sleep(duration).await,
                None => break,
            }
        }
    }
}

impl Default for DomainLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// The two global gates shared by every worker: a rate-limit backoff and a daily-quota deadline,
/// both epoch-seconds instants. Reads are plain atomic loads; writes go through the same atomic,
/// since both values only ever move forward in time and a stale read just means one extra sleep
/// iteration.
pub struct RendererGate {
    rate_limit_until: AtomicI64,
    quota_exceeded_until: AtomicI64,
}

impl RendererGate {
    pub fn new() -> Self {
        RendererGate {
            rate_limit_until: AtomicI64::new(0),
            quota_exceeded_until: AtomicI64::new(0),
        }
    }

    pub fn set_rate_limited_until(&self, until: i64) {
        self.rate_limit_until.store(until, Ordering::SeqCst);
    }

    pub fn set_quota_exceeded_until(&self, until: i64) {
        self.quota_exceeded_until.store(until, Ordering::SeqCst);
    }

    pub fn rate_limit_until(&self) -> i64 {
        self.rate_limit_until.load(Ordering::SeqCst)
    }

    pub fn quota_exceeded_until(&self) -> i64 {
        self.quota_exceeded_until.load(Ordering::SeqCst)
    }

    /// Seconds to sleep right now if either gate is active, capped at 30s per check so a worker
    /// re-evaluates both gates regularly instead of sleeping through a shorter one becoming free.
    pub fn gate_wait(&self, now: i64) -> Option<Duration> {
        let until = self
            .rate_limit_until
            .load(Ordering::SeqCst)
            .max(self.quota_exceeded_until.load(Ordering::SeqCst));
        if until > now {
            Some(Duration::from_secs((until - now).min(30) as u64))
        } else {
            None
        }
    }
}

impl Default for RendererGate {
    fn default() -> Self {
        Self::new()
    }
}
