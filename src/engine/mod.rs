//! SEDIMENT - Storage Engine Module
//! Top-level module for the append-only storage engine components.

pub mod codec;
pub mod index;
pub mod metrics;
pub mod recovery;
pub mod segment;
mod writer;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, SedimentError};
use crate::types::{Key, Value};

use self::index::HashIndex;
use self::metrics::EngineMetrics;
use self::writer::WriteRequest;

/// State shared between the facade, reader threads, and the writer
/// thread. The index is guarded by a reader/writer lock; the current
/// segment's id and write offset are mirrored in atomics so `size`
/// never has to ask the writer.
pub(crate) struct Shared {
    pub(crate) data_dir: PathBuf,
    pub(crate) index: RwLock<HashIndex>,
    pub(crate) current_segment_id: AtomicU64,
    pub(crate) current_offset: AtomicU64,
    pub(crate) metrics: EngineMetrics,
}

/// The core Sediment storage engine: an embedded, append-only,
/// log-structured key-value store.
///
/// Values are written sequentially into size-bounded segment files; an
/// in-memory index maps each key to its most recent on-disk location,
/// and the index is rebuilt by replaying segments on startup. One
/// dedicated writer thread applies all inserts; any number of reader
/// threads may run in parallel.
pub struct Sediment {
    shared: Arc<Shared>,
    /// Sender half of the bounded request queue. `None` once closed.
    requests: Mutex<Option<Sender<WriteRequest>>>,
    writer: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Sediment {
    /// Open or create a store in the configured directory.
    ///
    /// Recovery replays every segment to completion before the writer
    /// thread starts; an unreadable historical record fails the whole
    /// open with [`SedimentError::RecoveryFailed`].
    pub fn open(config: Config) -> Result<Self> {
        if config.segment_limit == 0 {
            return Err(SedimentError::Config(
                "segment_limit must be greater than zero".to_string(),
            ));
        }
        config.ensure_dirs()?;

        let recovered = recovery::recover(&config)?;
        let shared = Arc::new(Shared {
            data_dir: config.data_dir.clone(),
            index: RwLock::new(recovered.index),
            current_segment_id: AtomicU64::new(recovered.current.id()),
            current_offset: AtomicU64::new(recovered.current.offset()),
            metrics: EngineMetrics::new(),
        });
        shared.metrics.record_replay(recovered.records_replayed);

        log::info!(
            "opened store at {:?} ({} keys indexed, current segment {})",
            config.data_dir,
            shared.index.read().len(),
            recovered.current.id()
        );

        let (requests_tx, requests_rx) = channel::bounded(config.write_queue_capacity);
        let writer_shared = Arc::clone(&shared);
        let current = recovered.current;
        let handle = std::thread::Builder::new()
            .name("sediment-writer".to_string())
            .spawn(move || writer::run(writer_shared, current, requests_rx))?;

        Ok(Self {
            shared,
            requests: Mutex::new(Some(requests_tx)),
            writer: Mutex::new(Some(handle)),
        })
    }

    /// Insert a key-value pair.
    ///
    /// The request is queued to the writer thread and the caller blocks
    /// until that specific request has been applied; a full queue blocks
    /// the caller as back-pressure. Puts are applied in the order they
    /// are dequeued, and a `get` started after a `put` returns is
    /// guaranteed to observe it.
    pub fn put(&self, key: Key, value: Value) -> Result<()> {
        let requests = {
            let guard = self.requests.lock();
            match guard.as_ref() {
                Some(requests) => requests.clone(),
                None => return Err(SedimentError::Closed),
            }
        };

        let (done_tx, done_rx) = channel::bounded(1);
        requests
            .send(WriteRequest {
                key,
                value,
                done: done_tx,
            })
            .map_err(|_| SedimentError::Closed)?;

        match done_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(SedimentError::Closed),
        }
    }

    /// Get the most recently written value for a key.
    ///
    /// Takes the index's shared lock only for the lookup, then reads
    /// the record through an independent file handle, so gets never
    /// block on the writer's file I/O. The on-disk checksum is verified
    /// on every read.
    pub fn get(&self, key: &[u8]) -> Result<Value> {
        let location = self.shared.index.read().get(key);
        let location = match location {
            Some(location) => location,
            None => {
                self.shared.metrics.record_get(None);
                return Err(SedimentError::KeyNotFound);
            }
        };

        let entry = segment::read_entry_at(&self.shared.data_dir, location)?;
        self.shared.metrics.record_get(Some(entry.value.len()));
        Ok(entry.value)
    }

    /// Logical write offset of the *current* segment.
    ///
    /// This is not the total size of the store: sealed segments are
    /// not included, and the counter resets to zero on every rotation.
    pub fn size(&self) -> u64 {
        self.shared.current_offset.load(Ordering::Relaxed)
    }

    /// Engine operation counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.shared.metrics
    }

    /// Close the store.
    ///
    /// Stops accepting new puts, waits for the writer to drain every
    /// request already queued, then flushes and closes the current
    /// segment. Calling `close` a second time is a no-op.
    pub fn close(&self) -> Result<()> {
        let requests = self.requests.lock().take();
        if requests.is_none() {
            return Ok(());
        }
        // Dropping the last sender disconnects the queue; the writer
        // drains what is left and exits.
        drop(requests);

        if let Some(handle) = self.writer.lock().take() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "writer thread panicked",
                    )
                    .into());
                }
            }
        }
        log::info!("closed store at {:?}", self.shared.data_dir);
        Ok(())
    }
}

impl Drop for Sediment {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("error closing store on drop: {}", err);
        }
    }
}
