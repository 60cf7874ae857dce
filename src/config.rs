//! SEDIMENT - Engine Configuration
//! Defines tunable parameters for the append-only storage engine.

use std::path::PathBuf;

/// Configuration for the Sediment storage engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all segment files.
    pub data_dir: PathBuf,

    /// Maximum size of a segment in bytes before rotation. A single
    /// record larger than the limit is still written whole into a
    /// freshly rotated segment.
    pub segment_limit: u64,

    /// Whether to fsync the current segment after every append.
    /// When false, a completed put guarantees only a buffered write.
    pub sync_writes: bool,

    /// Capacity of the write request queue. Puts block the caller once
    /// the queue is full.
    pub write_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            segment_limit: 10 * 1024 * 1024, // 10 MB
            sync_writes: false,
            write_queue_capacity: 100,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the maximum segment size before rotation.
    pub fn with_segment_limit(mut self, limit: u64) -> Self {
        self.segment_limit = limit;
        self
    }

    /// Enable or disable fsync after every append.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Set the capacity of the write request queue.
    pub fn with_write_queue_capacity(mut self, capacity: usize) -> Self {
        self.write_queue_capacity = capacity;
        self
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
