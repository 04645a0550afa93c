use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Outcome of asking a breaker whether a request may proceed.
#[derive(Debug, PartialEq, Eq)]
pub enum BreakerCheck {
    /// CLOSED: proceed normally.
    Allowed,
    /// HALF_OPEN: this caller won the CAS race and owns the single probe.
    Probe,
    /// OPEN, still within `reset_timeout`: fail fast, no upstream I/O.
    Rejected,
}

/// Per-upstream breaker state. All transitions are serialized by CAS on
/// `state` plus a small mutex guarding `opened_at`; no lock is ever held
/// across an await.
pub struct UpstreamBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl UpstreamBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            failure_threshold,
            reset_timeout,
        }
    }

    /// Check (and, if OPEN past the timeout, transition to HALF_OPEN) before
    /// dispatching. Call once per request, before any upstream I/O.
    pub fn check(&self) -> BreakerCheck {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => BreakerCheck::Allowed,
            STATE_OPEN => {
                let elapsed = {
                    let opened_at = self.opened_at.lock().unwrap();
                    opened_at.map(|t| t.elapsed())
                };
                match elapsed {
                    Some(e) if e > self.reset_timeout => {
                        // First caller past the timeout wins the probe.
                        match self.state.compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        ) {
                            Ok(_) => BreakerCheck::Probe,
                            Err(_) => BreakerCheck::Rejected,
                        }
                    }
                    _ => BreakerCheck::Rejected,
                }
            }
            STATE_HALF_OPEN => BreakerCheck::Rejected,
            _ => unreachable!("invalid breaker state"),
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    /// Record a failed attempt (after retries are exhausted). Returns `true`
    /// if this call tripped the breaker to OPEN.
    pub fn record_failure(&self) -> bool {
        let state = self.state.load(Ordering::Acquire);
        if state == STATE_HALF_OPEN {
            self.trip();
            return true;
        }
        let count = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.failure_threshold {
            self.trip();
            true
        } else {
            false
        }
    }

    fn trip(&self) {
        *self.opened_at.lock().unwrap() = Some(Instant::now());
        self.state.store(STATE_OPEN, Ordering::Release);
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }
}

/// Registry of per-upstream breakers, created lazily on first use of a given
/// upstream URL.
pub struct BreakerRegistry {
    breakers: DashMap<String, UpstreamBreaker>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl BreakerRegistry {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold,
            reset_timeout,
        }
    }

    pub fn check(&self, upstream: &str) -> BreakerCheck {
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| UpstreamBreaker::new(self.failure_threshold, self.reset_timeout))
            .check()
    }

    pub fn record_success(&self, upstream: &str) {
        if let Some(b) = self.breakers.get(upstream) {
            b.record_success();
        }
    }

    /// Returns `true` if this failure tripped the breaker.
    pub fn record_failure(&self, upstream: &str) -> bool {
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| UpstreamBreaker::new(self.failure_threshold, self.reset_timeout))
            .record_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> UpstreamBreaker {
        UpstreamBreaker::new(2, Duration::from_millis(50))
    }

    #[test]
    fn test_starts_closed() {
        let b = breaker();
        assert_eq!(b.check(), BreakerCheck::Allowed);
    }

    #[test]
    fn test_trips_after_threshold_failures() {
        let b = breaker();
        assert!(!b.record_failure());
        assert!(b.record_failure());
        assert!(b.is_open());
        assert_eq!(b.check(), BreakerCheck::Rejected);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let b = breaker();
        b.record_failure();
        b.record_success();
        assert!(!b.record_failure());
        assert!(!b.is_open());
    }

    #[test]
    fn test_half_open_after_timeout() {
        let b = breaker();
        b.record_failure();
        b.record_failure();
        assert!(b.is_open());
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(b.check(), BreakerCheck::Probe);
    }

    #[test]
    fn test_half_open_success_closes() {
        let b = breaker();
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(b.check(), BreakerCheck::Probe);
        b.record_success();
        assert_eq!(b.check(), BreakerCheck::Allowed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let b = breaker();
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(b.check(), BreakerCheck::Probe);
        b.record_failure();
        assert!(b.is_open());
    }

    #[test]
    fn test_registry_is_per_upstream() {
        let reg = BreakerRegistry::new(1, Duration::from_secs(30));
        reg.record_failure("http://a");
        assert_eq!(reg.check("http://a"), BreakerCheck::Rejected);
        assert_eq!(reg.check("http://b"), BreakerCheck::Allowed);
    }
}
