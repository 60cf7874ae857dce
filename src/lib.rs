//! SEDIMENT - Append-Only Log-Structured Key-Value Store
//!
//! An embedded, crash-recoverable key-value store in the bitcask style:
//! records are appended to size-bounded segment files and an in-memory
//! hash index maps each key to its most recent on-disk location.
//!
//! ## Features
//! - **Binary record framing**: length-prefixed records with a SHA-1 value checksum
//! - **Segment rotation**: size-bounded `segment-<N>` files, never rewritten in place
//! - **Crash recovery**: the index is rebuilt by replaying all segments on open
//! - **Single-writer concurrency**: one writer thread, unlimited parallel readers
//! - **Metrics**: lock-free atomic counters for observability
//!
//! ## Example
//! ```no_run
//! use sediment::{config::Config, engine::Sediment};
//!
//! let config = Config::new("./data");
//! let store = Sediment::open(config).unwrap();
//!
//! store.put(b"key".to_vec(), b"value".to_vec()).unwrap();
//! assert_eq!(store.get(b"key").unwrap(), b"value".to_vec());
//! store.close().unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;
