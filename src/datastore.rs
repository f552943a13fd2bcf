use std::path::Path;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, error, info, trace};

use crate::batch::Batch;
use crate::config::{validate_configuration, Configuration, DatastoreOptions};
use crate::error::{DatastoreError, Result};
use crate::key::Key;
use crate::kv_store::{KvStore, MemStore, SledStore, WriteOp};
use crate::query::{run_query, Query, QueryResults};

/// Datastore over an ordered key-value engine.
///
/// Every call is synchronous. The engine handle sits behind a lock whose
/// read side is shared by all operations; [`Datastore::close`] takes the
/// write side and leaves the handle empty, so later calls get
/// [`DatastoreError::Closed`].
pub struct Datastore<S: KvStore> {
    store: RwLock<Option<S>>,
    options: DatastoreOptions,
}

impl Datastore<SledStore> {
    pub fn open(conf: &Configuration) -> Result<Self> {
        validate_configuration(conf)?;
        let store = SledStore::open_with_config(conf)?;
        Ok(Self::new(store, conf.into()))
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let store = SledStore::open(path)?;
        Ok(Self::new(store, DatastoreOptions::default()))
    }
}

impl Datastore<MemStore> {
    pub fn in_memory() -> Self {
        Self::new(MemStore::new(), DatastoreOptions::default())
    }
}

impl<S: KvStore> Datastore<S> {
    pub fn new(store: S, options: DatastoreOptions) -> Self {
        info!("datastore ready, options: {:?}", options);
        Self {
            store: RwLock::new(Some(store)),
            options,
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        let guard = self.store.read();
        let store = guard.as_ref().ok_or(DatastoreError::Closed)?;
        f(store)
    }

    pub fn options(&self) -> DatastoreOptions {
        self.options
    }

    pub fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        trace!("put {key}, {} bytes", value.len());
        self.with_store(|s| {
            s.kv_set(key.as_bytes(), value, self.options.write_options())
                .inspect_err(|e| error!("put {key} failed, err: {e}"))?;
            Ok(())
        })
    }

    pub fn get(&self, key: &Key) -> Result<Bytes> {
        trace!("get {key}");
        self.with_store(|s| s.kv_get(key.as_bytes())?.ok_or(DatastoreError::NotFound))
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn get_size(&self, key: &Key) -> Result<usize> {
        self.get(key).map(|v| v.len())
    }

    pub fn delete(&self, key: &Key) -> Result<()> {
        trace!("delete {key}");
        self.with_store(|s| {
            s.kv_delete(key.as_bytes(), self.options.write_options())
                .inspect_err(|e| error!("delete {key} failed, err: {e}"))?;
            Ok(())
        })
    }

    pub fn query(&self, query: Query) -> Result<QueryResults> {
        self.with_store(|s| run_query(s, query))
    }

    pub fn batch(&self) -> Batch<'_, S> {
        Batch::new(self)
    }

    pub(crate) fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.with_store(|s| {
            if ops.is_empty() {
                return Ok(());
            }

            let n = ops.len();
            s.kv_write_batch(ops, self.options.write_options())
                .inspect_err(|e| error!("batch commit failed, err: {e}"))?;
            debug!("committed batch of {n} ops");
            Ok(())
        })
    }

    /// Bytes on disk across every level the engine reports, plus the WAL
    /// when WAL reporting is on.
    pub fn disk_usage(&self) -> Result<u64> {
        self.with_store(|s| {
            let metrics = s.metrics()?;
            let mut total = metrics.level_bytes();
            if self.options.report_wal_size {
                total += metrics.wal_bytes;
            }
            Ok(total)
        })
    }

    pub fn set_wal_reporting(&mut self, on: bool) {
        self.options.report_wal_size = on;
    }

    pub fn sync(&self) -> Result<()> {
        self.with_store(|s| Ok(s.flush()?))
    }

    pub fn is_closed(&self) -> bool {
        self.store.read().is_none()
    }

    pub fn close(&self) -> Result<()> {
        let store = self.store.write().take().ok_or(DatastoreError::Closed)?;
        info!("closing datastore");
        store
            .close()
            .inspect_err(|e| error!("failed to close engine, err: {e}"))?;
        Ok(())
    }
}
