//! Lightweight per-process profiling of live vs. cached calls.

use std::fmt;
use std::fmt::Write;
use std::sync::Mutex;

use crate::request::Method;

/// One recorded call.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    /// Request method.
    pub method: Method,
    /// Resource path.
    pub resource: String,
    /// Elapsed transport time in milliseconds; `None` for cached calls.
    pub latency_ms: Option<u64>,
}

impl fmt::Display for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.resource)?;
        if let Some(ms) = self.latency_ms {
            write!(f, " {ms}ms")?;
        }
        Ok(())
    }
}

/// Profiler accumulates one record per call, split into live and cached
/// buckets.
///
/// Records are append-only and kept until process exit. Construct one per
/// process, wrap it in an `Arc` and hand it to every client; appends take a
/// mutex so concurrent calls never lose updates.
#[derive(Debug, Default)]
pub struct Profiler {
    live: Mutex<Vec<ProfileRecord>>,
    cached: Mutex<Vec<ProfileRecord>>,
}

impl Profiler {
    /// Create an empty profiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call. Cached calls carry no latency.
    pub fn record(&self, method: Method, resource: &str, cached: bool, latency_ms: Option<u64>) {
        let record = ProfileRecord {
            method,
            resource: resource.to_string(),
            latency_ms: if cached { None } else { latency_ms },
        };

        let bucket = if cached { &self.cached } else { &self.live };
        bucket.lock().expect("lock poisoned").push(record);
    }

    /// Number of live (transport) calls recorded.
    pub fn live_count(&self) -> usize {
        self.live.lock().expect("lock poisoned").len()
    }

    /// Number of cached calls recorded.
    pub fn cached_count(&self) -> usize {
        self.cached.lock().expect("lock poisoned").len()
    }

    /// One-line report of call totals.
    pub fn summary(&self) -> String {
        format!(
            "crowdmap ({} live, {} cached)",
            self.live_count(),
            self.cached_count()
        )
    }

    /// Full listing of every recorded call.
    pub fn dump(&self) -> String {
        let mut out = String::new();

        out.push_str("LIVE\n");
        for record in self.live.lock().expect("lock poisoned").iter() {
            let _ = writeln!(out, "{record}");
        }
        out.push_str("CACHED\n");
        for record in self.cached.lock().expect("lock poisoned").iter() {
            let _ = writeln!(out, "{record}");
        }

        out
    }
}
