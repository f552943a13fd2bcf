use bytes::Bytes;
use tracing::debug;

use crate::datastore::Datastore;
use crate::error::Result;
use crate::key::Key;
use crate::kv_store::{KvStore, WriteOp};

/// Pending mutations, applied all-or-nothing on [`Batch::commit`].
///
/// Nothing reaches the engine before `commit`; dropping the batch discards it.
pub struct Batch<'a, S: KvStore> {
    ds: &'a Datastore<S>,
    ops: Vec<WriteOp>,
}

impl<'a, S: KvStore> Batch<'a, S> {
    pub(crate) fn new(ds: &'a Datastore<S>) -> Self {
        Self { ds, ops: vec![] }
    }

    pub fn put(&mut self, key: &Key, value: impl AsRef<[u8]>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            key: Bytes::copy_from_slice(key.as_bytes()),
            value: Bytes::copy_from_slice(value.as_ref()),
        });
        self
    }

    pub fn delete(&mut self, key: &Key) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            key: Bytes::copy_from_slice(key.as_bytes()),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn commit(mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.ops);
        self.ds.commit_batch(ops)
    }
}

impl<S: KvStore> Drop for Batch<'_, S> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            debug!("discard uncommitted batch of {} ops", self.ops.len());
        }
    }
}
