//! Content addressing for message bodies.
//!
//! `ContentHasher` is defined here so services can hash content without
//! coupling to a specific algorithm. The `Sha256ContentHasher` adapter lives
//! in orbi-infra.
//!
//! A body's address is the first 8 hex chars of `hash(content ‖ instant)`,
//! where the instant comes from a `MonotonicClock` so that no two inserts in
//! one process ever share an instant.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use orbi_types::message::HASH_LEN;

/// Abstraction over content hashing.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}

/// Short address of `content` created at `instant_nanos`.
pub fn content_address(hasher: &dyn ContentHasher, content: &str, instant_nanos: i64) -> String {
    let mut digest = hasher.compute_hash(&format!("{content}{instant_nanos}"));
    digest.truncate(HASH_LEN);
    digest
}

/// Strictly increasing nanosecond clock.
///
/// Returns wall-clock nanoseconds, bumped by one whenever the wall clock
/// has not advanced past the previous reading.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_nanos(&self) -> i64 {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
