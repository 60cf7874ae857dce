//! SEDIMENT - Startup Recovery
//! Replays every segment in ascending id order to rebuild the hash
//! index and locate the writable tail of the newest segment. Runs
//! single-threaded, to completion, before any reader or the writer
//! task starts.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::Config;
use crate::engine::codec;
use crate::engine::index::HashIndex;
use crate::engine::segment::{self, CurrentSegment};
use crate::error::{Result, SedimentError};
use crate::types::SegmentRef;

/// Everything `open` needs after replay: the rebuilt index and the
/// newest segment reopened for append.
pub struct RecoveredStore {
    pub index: HashIndex,
    pub current: CurrentSegment,
    pub records_replayed: u64,
}

/// Replay all segments under `config.data_dir`.
///
/// Any record that fails to decode for a reason other than a clean
/// end-of-segment boundary aborts the whole open: once one record is
/// unreadable the byte offset of the next cannot be trusted, and a
/// partial index must never be served. A tail record truncated by a
/// crash is treated the same way.
pub fn recover(config: &Config) -> Result<RecoveredStore> {
    let dir = config.data_dir.as_path();
    let ids = segment::list_segment_ids(dir)?;

    let mut index = HashIndex::new();
    let mut records_replayed = 0;
    for &id in &ids {
        records_replayed += replay_segment(dir, id, &mut index)?;
        log::debug!("replayed segment {}", id);
    }

    let current = match ids.last() {
        Some(&newest) => {
            CurrentSegment::open_existing(dir, config.segment_limit, config.sync_writes, newest)?
        }
        None => CurrentSegment::create(dir, config.segment_limit, config.sync_writes, 0)?,
    };

    Ok(RecoveredStore {
        index,
        current,
        records_replayed,
    })
}

/// Sequentially decode one segment from offset 0, tracking the running
/// byte offset so every record's start is known exactly. Later records
/// overwrite earlier index entries for the same key.
fn replay_segment(dir: &Path, id: u64, index: &mut HashIndex) -> Result<u64> {
    let file = File::open(segment::segment_path(dir, id))?;
    let mut reader = BufReader::new(file);

    let mut offset = 0;
    let mut count = 0;
    loop {
        match codec::decode_from_stream(&mut reader) {
            Ok(Some((entry, consumed))) => {
                index.insert(entry.key, SegmentRef { segment_id: id, offset });
                offset += consumed;
                count += 1;
            }
            Ok(None) => return Ok(count),
            Err(err) => {
                return Err(SedimentError::RecoveryFailed(format!(
                    "segment {} unreadable at offset {}: {}",
                    id, offset, err
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entry;
    use std::io::Write;

    fn write_records(dir: &Path, id: u64, entries: &[Entry]) {
        let mut file = File::create(segment::segment_path(dir, id)).unwrap();
        for entry in entries {
            file.write_all(&codec::encode(entry)).unwrap();
        }
    }

    fn config_for(dir: &Path) -> Config {
        Config::new(dir).with_segment_limit(1024)
    }

    #[test]
    fn test_empty_directory_creates_first_segment() {
        let dir = tempfile::tempdir().unwrap();
        let recovered = recover(&config_for(dir.path())).unwrap();

        assert!(recovered.index.is_empty());
        assert_eq!(recovered.current.id(), 0);
        assert_eq!(recovered.current.offset(), 0);
        assert_eq!(recovered.records_replayed, 0);
        assert!(segment::segment_path(dir.path(), 0).exists());
    }

    #[test]
    fn test_replay_rebuilds_index_across_segments() {
        let dir = tempfile::tempdir().unwrap();
        write_records(
            dir.path(),
            0,
            &[
                Entry::new(b"a".to_vec(), b"old".to_vec()),
                Entry::new(b"b".to_vec(), b"1".to_vec()),
            ],
        );
        write_records(dir.path(), 1, &[Entry::new(b"a".to_vec(), b"new".to_vec())]);

        let recovered = recover(&config_for(dir.path())).unwrap();
        assert_eq!(recovered.records_replayed, 3);
        assert_eq!(recovered.index.len(), 2);

        // "a" was rewritten in segment 1; the later record wins.
        let a = recovered.index.get(b"a").unwrap();
        assert_eq!(a, SegmentRef { segment_id: 1, offset: 0 });

        let b = recovered.index.get(b"b").unwrap();
        assert_eq!(b.segment_id, 0);
        assert_eq!(
            segment::read_entry_at(dir.path(), b).unwrap().value,
            b"1".to_vec()
        );
    }

    #[test]
    fn test_newest_segment_becomes_current() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry::new(b"k".to_vec(), b"v".to_vec());
        write_records(dir.path(), 0, &[entry.clone()]);
        write_records(dir.path(), 3, &[entry.clone()]);

        let recovered = recover(&config_for(dir.path())).unwrap();
        assert_eq!(recovered.current.id(), 3);
        assert_eq!(
            recovered.current.offset(),
            codec::encode(&entry).len() as u64
        );
    }

    #[test]
    fn test_corrupt_record_aborts_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = codec::encode(&Entry::new(b"k".to_vec(), b"v".to_vec()));
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF; // breaks the checksum
        std::fs::write(segment::segment_path(dir.path(), 0), &bytes).unwrap();

        match recover(&config_for(dir.path())) {
            Err(SedimentError::RecoveryFailed(_)) => {}
            other => panic!("expected RecoveryFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_tail_aborts_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = codec::encode(&Entry::new(b"k".to_vec(), b"v".to_vec()));
        bytes.extend_from_slice(&codec::encode(&Entry::new(b"k2".to_vec(), b"v2".to_vec())));
        bytes.truncate(bytes.len() - 5); // partial record at the tail
        std::fs::write(segment::segment_path(dir.path(), 0), &bytes).unwrap();

        match recover(&config_for(dir.path())) {
            Err(SedimentError::RecoveryFailed(_)) => {}
            other => panic!("expected RecoveryFailed, got {:?}", other.map(|_| ())),
        }
    }
}
