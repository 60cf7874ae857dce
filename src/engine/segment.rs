//! SEDIMENT - Segment Files
//! Append-only, size-bounded files on durable storage, named by a
//! monotonically increasing id. Exactly one segment is open for append
//! at any time; all older segments are sealed and read-only.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::engine::codec;
use crate::error::{Result, SedimentError};
use crate::types::{Entry, SegmentRef};

/// Filename prefix for segment files.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Filename for the segment with the given id, e.g. `segment-3`.
pub fn segment_filename(id: u64) -> String {
    format!("{}{}", SEGMENT_PREFIX, id)
}

/// Full path to the segment with the given id.
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(segment_filename(id))
}

/// Parse a segment id out of a filename. Returns `None` for names that
/// do not match the `segment-<N>` pattern.
pub fn parse_segment_id(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
}

/// Scan the directory and return all segment ids in ascending order.
/// Non-matching filenames are ignored.
pub fn list_segment_ids(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;
        if let Some(name) = dirent.file_name().to_str() {
            if let Some(id) = parse_segment_id(name) {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// The one segment currently open for append. Owned exclusively by the
/// writer; rotation happens here when the size limit would be exceeded.
pub struct CurrentSegment {
    dir: PathBuf,
    limit: u64,
    sync_writes: bool,
    id: u64,
    file: File,
    offset: u64,
}

impl CurrentSegment {
    /// Create a fresh segment with the given id, open for append at
    /// offset 0.
    pub fn create(dir: &Path, limit: u64, sync_writes: bool, id: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(dir, id))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            limit,
            sync_writes,
            id,
            file,
            offset: 0,
        })
    }

    /// Reopen an existing segment for append, initializing the write
    /// offset from its on-disk size.
    pub fn open_existing(dir: &Path, limit: u64, sync_writes: bool, id: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(segment_path(dir, id))?;
        let offset = file.metadata()?.len();
        Ok(Self {
            dir: dir.to_path_buf(),
            limit,
            sync_writes,
            id,
            file,
            offset,
        })
    }

    /// Id of the segment currently open for append.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Logical write offset within the current segment.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append one encoded record, rotating first if it would push the
    /// segment past its limit. A record larger than the limit itself is
    /// still written whole into the freshly rotated segment. Returns the
    /// location the record was written at.
    pub fn append(&mut self, encoded: &[u8]) -> Result<SegmentRef> {
        if self.offset + encoded.len() as u64 > self.limit {
            self.rotate()?;
        }
        self.file.write_all(encoded)?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        let location = SegmentRef {
            segment_id: self.id,
            offset: self.offset,
        };
        self.offset += encoded.len() as u64;
        Ok(location)
    }

    /// Seal the current file and open the next segment at offset 0.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        let next = self.id + 1;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(&self.dir, next))?;
        log::info!("rotated segment {} -> {}", self.id, next);
        self.id = next;
        self.offset = 0;
        Ok(())
    }

    /// Flush (and optionally sync) buffered data. Called once when the
    /// writer shuts down; the file handle closes on drop.
    pub fn finish(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

/// Read exactly one record at the given location, using an independent
/// file handle so concurrent lookups never coordinate.
pub fn read_entry_at(dir: &Path, location: SegmentRef) -> Result<Entry> {
    let file = File::open(segment_path(dir, location.segment_id))?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(location.offset))?;
    match codec::decode_from_stream(&mut reader)? {
        Some((entry, _)) => Ok(entry),
        None => Err(SedimentError::Corrupted(format!(
            "no record at offset {} of segment {}",
            location.offset, location.segment_id
        ))),
    }
}
