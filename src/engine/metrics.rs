//! SEDIMENT - Engine Metrics & Observability
//! Provides atomic counters for tracking engine operations
//! in a lock-free, thread-safe manner using `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for the Sediment engine.
///
/// All counters use `Ordering::Relaxed` since we only need
/// eventual consistency for observability — not synchronization.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Total number of applied `put` operations.
    pub puts: AtomicU64,
    /// Total number of `get` operations.
    pub gets: AtomicU64,
    /// Total encoded bytes appended to segments.
    pub bytes_written: AtomicU64,
    /// Total value bytes returned by `get`.
    pub bytes_read: AtomicU64,
    /// Number of segment rotations.
    pub rotations: AtomicU64,
    /// Records replayed during startup recovery.
    pub records_replayed: AtomicU64,
    /// Timestamp when the engine was opened.
    engine_started: Instant,
}

impl EngineMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            records_replayed: AtomicU64::new(0),
            engine_started: Instant::now(),
        }
    }

    /// Record an applied put of `encoded_size` bytes.
    pub fn record_put(&self, encoded_size: usize) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(encoded_size as u64, Ordering::Relaxed);
    }

    /// Record a get operation; `value_size` is `None` on a miss.
    pub fn record_get(&self, value_size: Option<usize>) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if let Some(size) = value_size {
            self.bytes_read.fetch_add(size as u64, Ordering::Relaxed);
        }
    }

    /// Record a segment rotation.
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the number of records replayed at startup.
    pub fn record_replay(&self, records: u64) {
        self.records_replayed.fetch_add(records, Ordering::Relaxed);
    }

    /// Get engine uptime in seconds.
    pub fn uptime_secs(&self) -> f64 {
        self.engine_started.elapsed().as_secs_f64()
    }

    /// Get total number of operations (puts + gets).
    pub fn total_ops(&self) -> u64 {
        self.puts.load(Ordering::Relaxed) + self.gets.load(Ordering::Relaxed)
    }

    /// Get operations per second since engine start.
    pub fn ops_per_sec(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime < 0.001 {
            return 0.0;
        }
        self.total_ops() as f64 / uptime
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "\n═══ SEDIMENT Engine Metrics ═══\n\
             Operations:\n\
               puts:      {}\n\
               gets:      {}\n\
               rotations: {}\n\
             Throughput:\n\
               total ops: {}\n\
               ops/sec:   {:.2}\n\
             I/O:\n\
               written:   {} bytes\n\
               read:      {} bytes\n\
             Recovery:\n\
               records replayed: {}\n\
             Uptime: {:.2}s",
            self.puts.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.rotations.load(Ordering::Relaxed),
            self.total_ops(),
            self.ops_per_sec(),
            self.bytes_written.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            self.records_replayed.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
