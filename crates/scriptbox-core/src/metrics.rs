//! Process-wide invocation counters.
//!
//! Incremented at the call site, emitted as one `tracing::info!` event by
//! [`Metrics::flush`] (the daemon flushes on shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::request::ErrorCode;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    invocations: AtomicU64,
    successes: AtomicU64,
    runtime_errors: AtomicU64,
    timeouts: AtomicU64,
    invalid_requests: AtomicU64,
    bridge_requests: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            runtime_errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            bridge_requests: AtomicU64::new(0),
        }
    }

    pub fn inc_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "invocations", "counter incremented");
    }

    /// Count a finished invocation under its outcome.
    pub fn record_outcome(&self, code: ErrorCode) {
        let (counter, name) = match code {
            ErrorCode::Success => (&self.successes, "successes"),
            ErrorCode::InvalidRequest => (&self.invalid_requests, "invalid_requests"),
            ErrorCode::RuntimeError => (&self.runtime_errors, "runtime_errors"),
            ErrorCode::Timeout => (&self.timeouts, "timeouts"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_bridge_requests(&self) {
        self.bridge_requests.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "bridge_requests", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            invocations = self.invocations(),
            successes = self.successes(),
            runtime_errors = self.runtime_errors(),
            timeouts = self.timeouts(),
            invalid_requests = self.invalid_requests(),
            bridge_requests = self.bridge_requests(),
        );
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn runtime_errors(&self) -> u64 {
        self.runtime_errors.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn invalid_requests(&self) -> u64 {
        self.invalid_requests.load(Ordering::Relaxed)
    }

    pub fn bridge_requests(&self) -> u64 {
        self.bridge_requests.load(Ordering::Relaxed)
    }
}
