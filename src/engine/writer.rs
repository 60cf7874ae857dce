//! SEDIMENT - Write Serializer
//! All inserts are funneled through one dedicated writer thread, so
//! encoding, rotation, and the index update for a record happen
//! atomically relative to every other insert. Appends and rotation are
//! never interleaved across concurrent puts.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};

use crate::engine::codec;
use crate::engine::segment::CurrentSegment;
use crate::engine::Shared;
use crate::error::Result;
use crate::types::{Entry, Key, Value};

/// One queued insert. `done` is the caller's private completion
/// channel; the blocked `put` resumes when the writer sends on it.
pub(crate) struct WriteRequest {
    pub key: Key,
    pub value: Value,
    pub done: Sender<Result<()>>,
}

/// Writer loop. Iteration ends once every request sender has been
/// dropped and the queue is drained, so requests already queued when
/// the store closes are still honored. Flushes the current segment on
/// the way out; the close path surfaces the result via the join handle.
pub(crate) fn run(
    shared: Arc<Shared>,
    mut current: CurrentSegment,
    requests: Receiver<WriteRequest>,
) -> Result<()> {
    for request in requests.iter() {
        let result = apply(&shared, &mut current, request.key, request.value);
        // The caller may have gone away; nothing to deliver then.
        let _ = request.done.send(result);
    }
    current.finish()
}

/// Apply a single insert: encode, append (rotating if needed), then
/// update the index under the exclusive lock. File I/O stays outside
/// the lock so readers only ever wait on the map update itself.
fn apply(shared: &Shared, current: &mut CurrentSegment, key: Key, value: Value) -> Result<()> {
    let entry = Entry::new(key, value);
    let encoded = codec::encode(&entry);

    let location = current.append(&encoded)?;
    if location.segment_id != shared.current_segment_id.load(Ordering::Relaxed) {
        shared
            .current_segment_id
            .store(location.segment_id, Ordering::Relaxed);
        shared.metrics.record_rotation();
    }

    {
        let mut index = shared.index.write();
        index.insert(entry.key, location);
    }
    shared
        .current_offset
        .store(current.offset(), Ordering::Relaxed);
    shared.metrics.record_put(encoded.len());
    Ok(())
}
