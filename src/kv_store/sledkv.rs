use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard};
use sled;
use tracing::{debug, error, info, trace};

use super::{
    KvIterator, KvResult, KvSnapshot, KvStore, KvStoreError, LevelMetrics, StoreMetrics,
    WriteOp, WriteOptions,
};
use crate::config::Configuration;

/// sled-backed engine.
///
/// sled has no point-in-time snapshots, so every mutation goes through an
/// exclusive write gate and every snapshot holds the shared side of it.
/// A live snapshot therefore keeps writers waiting until it is dropped.
pub struct SledStore {
    db: sled::Db,
    write_gate: Arc<RwLock<()>>,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        info!("open sledkv db at {:?}", path.as_ref());

        let db = sled::open(path.as_ref())
            .inspect_err(|e| error!("failed to open sledkv db, err: {e}"))?;
        Ok(Self::from_db(db))
    }

    pub fn open_with_config(conf: &Configuration) -> KvResult<Self> {
        let path = conf
            .path
            .as_deref()
            .ok_or_else(|| KvStoreError::backend("missing db path"))?;
        info!("open sledkv db at {path} with {:?}", conf);

        let mut sled_conf = sled::Config::new().path(path);
        if let Some(capacity) = conf.cache_capacity {
            sled_conf = sled_conf.cache_capacity(capacity);
        }
        if let Some(ms) = conf.flush_every_ms {
            sled_conf = sled_conf.flush_every_ms(Some(ms));
        }

        let db = sled_conf
            .open()
            .inspect_err(|e| error!("failed to open sledkv db {path}, err: {e}"))?;
        Ok(Self::from_db(db))
    }

    fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            write_gate: Arc::new(RwLock::new(())),
        }
    }

    fn sync_if(&self, opts: WriteOptions) -> KvResult<()> {
        if opts.sync {
            self.db.flush()?;
        }
        Ok(())
    }
}

impl Clone for SledStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            write_gate: self.write_gate.clone(),
        }
    }
}

impl KvStore for SledStore {
    type Snapshot<'a> = SledSnapshot<'a> where Self: 'a;

    fn kv_get(&self, key: &[u8]) -> KvResult<Option<Bytes>> {
        let iv = self.db.get(key)?;
        Ok(iv.map(|v| Bytes::copy_from_slice(&v)))
    }

    fn kv_set(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> KvResult<()> {
        let _gate = self.write_gate.write();
        self.db.insert(key, value)?;
        self.sync_if(opts)
    }

    fn kv_delete(&self, key: &[u8], opts: WriteOptions) -> KvResult<()> {
        let _gate = self.write_gate.write();
        self.db.remove(key)?;
        self.sync_if(opts)
    }

    fn kv_write_batch(&self, ops: Vec<WriteOp>, opts: WriteOptions) -> KvResult<()> {
        let mut batch = sled::Batch::default();
        for op in ops.iter() {
            match op {
                WriteOp::Put { key, value } => batch.insert(&key[..], &value[..]),
                WriteOp::Delete { key } => batch.remove(&key[..]),
            }
        }

        let _gate = self.write_gate.write();
        self.db
            .apply_batch(batch)
            .inspect_err(|e| error!("apply batch of {} ops failed, err: {e}", ops.len()))?;
        self.sync_if(opts)
    }

    fn snapshot(&self) -> KvResult<SledSnapshot<'_>> {
        trace!("pin sledkv snapshot");
        Ok(SledSnapshot {
            tree: &self.db,
            _pin: self.write_gate.read(),
        })
    }

    fn metrics(&self) -> KvResult<StoreMetrics> {
        let size_on_disk = self.db.size_on_disk()?;

        // sled's log-structured file is the store itself; there is no separate WAL.
        Ok(StoreMetrics {
            backend: "sled",
            levels: vec![LevelMetrics {
                name: "db".to_string(),
                size: size_on_disk,
            }],
            wal_bytes: 0,
        })
    }

    fn flush(&self) -> KvResult<()> {
        let flushed = self.db.flush()?;
        debug!("flushed {flushed} bytes");
        Ok(())
    }

    fn close(self) -> KvResult<()> {
        info!("close sledkv db");
        self.db
            .flush()
            .inspect_err(|e| error!("flush on close failed, err: {e}"))?;
        Ok(())
    }
}

pub struct SledSnapshot<'a> {
    tree: &'a sled::Tree,
    _pin: RwLockReadGuard<'a, ()>,
}

impl KvSnapshot for SledSnapshot<'_> {
    type Iter<'s> = SledIter<'s> where Self: 's;

    fn iter(&self, lower_bound: Option<&[u8]>) -> KvResult<SledIter<'_>> {
        Ok(SledIter {
            tree: self.tree,
            lower_bound: lower_bound.map(|b| b.to_vec()),
            inner: None,
            current: None,
        })
    }
}

pub struct SledIter<'a> {
    tree: &'a sled::Tree,
    lower_bound: Option<Vec<u8>>,
    inner: Option<sled::Iter>,
    current: Option<(sled::IVec, sled::IVec)>,
}

impl SledIter<'_> {
    fn advance(&mut self) -> KvResult<bool> {
        let next = match self.inner.as_mut() {
            Some(inner) => inner.next(),
            None => return Ok(false),
        };

        match next {
            Some(Ok(kv)) => {
                self.current = Some(kv);
                Ok(true)
            }
            Some(Err(e)) => {
                self.current = None;
                self.inner = None;
                Err(e.into())
            }
            None => {
                self.current = None;
                self.inner = None;
                Ok(false)
            }
        }
    }
}

impl KvIterator for SledIter<'_> {
    fn seek_ge(&mut self, key: &[u8]) -> KvResult<bool> {
        let start = match &self.lower_bound {
            Some(lower) if lower.as_slice() > key => lower.clone(),
            _ => key.to_vec(),
        };
        self.inner = Some(self.tree.range(start..));
        self.advance()
    }

    fn next(&mut self) -> KvResult<bool> {
        self.advance()
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_ref()).unwrap_or(&[])
    }

    fn value(&self) -> KvResult<Bytes> {
        self.current
            .as_ref()
            .map(|(_, v)| Bytes::copy_from_slice(v))
            .ok_or(KvStoreError::InvalidIterator)
    }
}
