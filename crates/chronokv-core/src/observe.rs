//! Optional metrics instrumentation
//!
//! With the `observe` feature enabled, commits, cache lookups and recovery
//! emit counters and histograms through the [`metrics`] crate. The embedding
//! application installs the recorder.
//!
//! Without the feature every function here is a zero-cost no-op.

/// Record a successful commit.
///
/// - `chronokv.commit.total` – counter
/// - `chronokv.commit.duration_seconds` – histogram
/// - `chronokv.commit.entries` – histogram of physically written entries
#[inline]
pub fn record_commit(duration: std::time::Duration, entries: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronokv.commit.total").increment(1);
        metrics::histogram!("chronokv.commit.duration_seconds").record(duration.as_secs_f64());
        metrics::histogram!("chronokv.commit.entries").record(entries as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, entries);
    }
}

/// Record a commit (or incremental step) that was rolled back after a failure.
///
/// - `chronokv.commit.rollbacks_total` – counter
#[inline]
pub fn record_commit_rollback() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronokv.commit.rollbacks_total").increment(1);
    }
}

/// Record one incremental commit step.
///
/// - `chronokv.incremental.total` – counter
#[inline]
pub fn record_incremental_commit() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronokv.incremental.total").increment(1);
    }
}

/// Record a cache hit or miss.
///
/// - `chronokv.cache.lookups_total` – counter with `result` label (`hit` / `miss`)
#[inline]
pub fn record_cache_lookup(hit: bool) {
    #[cfg(feature = "observe")]
    {
        let result = if hit { "hit" } else { "miss" };
        metrics::counter!("chronokv.cache.lookups_total", "result" => result).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = hit;
    }
}

/// Set the current cache size gauge.
///
/// - `chronokv.cache.size` – gauge
#[inline]
pub fn set_cache_size(size: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("chronokv.cache.size").set(size as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = size;
    }
}

/// Record a branch rolled back by startup recovery.
///
/// - `chronokv.recovery.total` – counter
#[inline]
pub fn record_recovery() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronokv.recovery.total").increment(1);
    }
}
