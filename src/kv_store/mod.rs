mod error;
mod memkv;
mod sledkv;

use bytes::Bytes;

pub use error::{KvResult, KvStoreError};
pub use memkv::{MemIter, MemSnapshot, MemStore};
pub use sledkv::{SledIter, SledSnapshot, SledStore};

/// Durability knob passed down with every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Flush to durable storage before the write returns.
    pub sync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Bytes, value: Bytes },
    Delete { key: Bytes },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelMetrics {
    pub name: String,
    pub size: u64,
}

/// Size accounting reported by an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub backend: &'static str,
    pub levels: Vec<LevelMetrics>,
    pub wal_bytes: u64,
}

impl StoreMetrics {
    pub fn level_bytes(&self) -> u64 {
        self.levels.iter().map(|l| l.size).sum()
    }
}

/// An embedded ordered key-value engine.
///
/// Implementors must apply [`KvStore::kv_write_batch`] all-or-nothing: a batch
/// that fails leaves none of its operations visible.
pub trait KvStore: Send + Sync {
    type Snapshot<'a>: KvSnapshot
    where
        Self: 'a;

    fn kv_get(&self, key: &[u8]) -> KvResult<Option<Bytes>>;
    fn kv_set(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> KvResult<()>;
    fn kv_delete(&self, key: &[u8], opts: WriteOptions) -> KvResult<()>;
    fn kv_write_batch(&self, ops: Vec<WriteOp>, opts: WriteOptions) -> KvResult<()>;

    /// Pins a point-in-time view. Writes issued after this call are not
    /// observed through the returned snapshot.
    fn snapshot(&self) -> KvResult<Self::Snapshot<'_>>;

    fn metrics(&self) -> KvResult<StoreMetrics>;
    fn flush(&self) -> KvResult<()>;
    fn close(self) -> KvResult<()>
    where
        Self: Sized;
}

/// Immutable read view. Dropping it releases whatever the engine pinned.
pub trait KvSnapshot {
    type Iter<'a>: KvIterator
    where
        Self: 'a;

    /// Opens a cursor. With a lower bound, the cursor never yields keys below it.
    fn iter(&self, lower_bound: Option<&[u8]>) -> KvResult<Self::Iter<'_>>;
}

/// Cursor over one snapshot.
///
/// A fresh cursor is unpositioned; call `seek_ge` first. `key` and `value`
/// are only meaningful while the last positioning call returned `true`.
pub trait KvIterator {
    fn seek_ge(&mut self, key: &[u8]) -> KvResult<bool>;
    fn next(&mut self) -> KvResult<bool>;
    fn valid(&self) -> bool;
    fn key(&self) -> &[u8];
    fn value(&self) -> KvResult<Bytes>;
}
