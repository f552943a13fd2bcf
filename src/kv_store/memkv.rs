use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use im::OrdMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{
    KvIterator, KvResult, KvSnapshot, KvStore, KvStoreError, LevelMetrics, StoreMetrics,
    WriteOp, WriteOptions,
};

/// In-memory engine over a persistent ordered map.
///
/// Snapshots are structural-sharing clones of the map, so they never block
/// writers. `wal_bytes` counts bytes written since the last flush.
#[derive(Default)]
pub struct MemStore {
    data: RwLock<OrdMap<Bytes, Bytes>>,
    wal_bytes: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn after_write(&self, written: usize, opts: WriteOptions) {
        if opts.sync {
            self.wal_bytes.store(0, Ordering::Relaxed);
        } else {
            self.wal_bytes.fetch_add(written as u64, Ordering::Relaxed);
        }
    }
}

impl KvStore for MemStore {
    type Snapshot<'a> = MemSnapshot where Self: 'a;

    fn kv_get(&self, key: &[u8]) -> KvResult<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn kv_set(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> KvResult<()> {
        self.data
            .write()
            .insert(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        self.after_write(key.len() + value.len(), opts);
        Ok(())
    }

    fn kv_delete(&self, key: &[u8], opts: WriteOptions) -> KvResult<()> {
        self.data.write().remove(key);
        self.after_write(key.len(), opts);
        Ok(())
    }

    fn kv_write_batch(&self, ops: Vec<WriteOp>, opts: WriteOptions) -> KvResult<()> {
        let mut written = 0;
        let mut data = self.data.write();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    written += key.len() + value.len();
                    data.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    written += key.len();
                    data.remove(&key);
                }
            }
        }
        drop(data);

        self.after_write(written, opts);
        Ok(())
    }

    fn snapshot(&self) -> KvResult<MemSnapshot> {
        trace!("clone memkv snapshot");
        Ok(MemSnapshot {
            data: self.data.read().clone(),
        })
    }

    fn metrics(&self) -> KvResult<StoreMetrics> {
        let live: usize = self
            .data
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();

        Ok(StoreMetrics {
            backend: "memory",
            levels: vec![LevelMetrics {
                name: "memtable".to_string(),
                size: live as u64,
            }],
            wal_bytes: self.wal_bytes.load(Ordering::Relaxed),
        })
    }

    fn flush(&self) -> KvResult<()> {
        self.wal_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn close(self) -> KvResult<()> {
        Ok(())
    }
}

pub struct MemSnapshot {
    data: OrdMap<Bytes, Bytes>,
}

impl KvSnapshot for MemSnapshot {
    type Iter<'s> = MemIter<'s> where Self: 's;

    fn iter(&self, lower_bound: Option<&[u8]>) -> KvResult<MemIter<'_>> {
        Ok(MemIter {
            data: &self.data,
            lower_bound: lower_bound.map(Bytes::copy_from_slice),
            inner: None,
            current: None,
        })
    }
}

type Entries<'a> = Box<dyn Iterator<Item = (&'a Bytes, &'a Bytes)> + 'a>;

pub struct MemIter<'a> {
    data: &'a OrdMap<Bytes, Bytes>,
    lower_bound: Option<Bytes>,
    inner: Option<Entries<'a>>,
    current: Option<(&'a Bytes, &'a Bytes)>,
}

impl MemIter<'_> {
    fn advance(&mut self) -> bool {
        self.current = self.inner.as_mut().and_then(|it| it.next());
        if self.current.is_none() {
            self.inner = None;
        }
        self.current.is_some()
    }
}

impl<'a> KvIterator for MemIter<'a> {
    fn seek_ge(&mut self, key: &[u8]) -> KvResult<bool> {
        let data: &'a OrdMap<Bytes, Bytes> = self.data;
        let start: &[u8] = match &self.lower_bound {
            Some(lower) if &lower[..] > key => &lower[..],
            _ => key,
        };
        let range = data.range::<_, [u8]>((Bound::Included(start), Bound::Unbounded));
        self.inner = Some(Box::new(range));
        Ok(self.advance())
    }

    fn next(&mut self) -> KvResult<bool> {
        Ok(self.advance())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.map(|(k, _)| &k[..]).unwrap_or(&[])
    }

    fn value(&self) -> KvResult<Bytes> {
        self.current
            .map(|(_, v)| v.clone())
            .ok_or(KvStoreError::InvalidIterator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &MemStore, key: &str, value: &str) {
        store
            .kv_set(key.as_bytes(), value.as_bytes(), WriteOptions::default())
            .unwrap();
    }

    fn scan(snap: &MemSnapshot, lower: Option<&[u8]>) -> Vec<(Bytes, Bytes)> {
        let mut it = snap.iter(lower).unwrap();
        let mut out = vec![];
        let mut valid = it.seek_ge(lower.unwrap_or(b"")).unwrap();
        while valid {
            out.push((Bytes::copy_from_slice(it.key()), it.value().unwrap()));
            valid = it.next().unwrap();
        }
        out
    }

    #[test]
    fn test_snapshot_ignores_later_writes() {
        let store = MemStore::new();
        put(&store, "/a", "1");

        let snap = store.snapshot().unwrap();
        put(&store, "/b", "2");
        store.kv_delete(b"/a", WriteOptions::default()).unwrap();

        let seen = scan(&snap, None);
        assert_eq!(seen, vec![(Bytes::from("/a"), Bytes::from("1"))]);

        let now = scan(&store.snapshot().unwrap(), None);
        assert_eq!(now, vec![(Bytes::from("/b"), Bytes::from("2"))]);
    }

    #[test]
    fn test_seek_clamps_to_lower_bound() {
        let store = MemStore::new();
        for k in ["/a", "/b", "/c"] {
            put(&store, k, "v");
        }

        let snap = store.snapshot().unwrap();
        let mut it = snap.iter(Some(&b"/b"[..])).unwrap();
        assert!(it.seek_ge(b"").unwrap());
        assert_eq!(it.key(), b"/b");
        assert!(it.next().unwrap());
        assert_eq!(it.key(), b"/c");
        assert!(!it.next().unwrap());
        assert!(!it.valid());
        assert!(!it.next().unwrap());
    }

    #[test]
    fn test_unpositioned_iterator_has_no_value() {
        let store = MemStore::new();
        let snap = store.snapshot().unwrap();
        let mut it = snap.iter(None).unwrap();

        assert!(!it.valid());
        assert!(it.key().is_empty());
        assert!(matches!(it.value(), Err(KvStoreError::InvalidIterator)));
        assert!(!it.seek_ge(b"/").unwrap());
    }

    #[test]
    fn test_wal_bytes_reset_on_flush() {
        let store = MemStore::new();
        put(&store, "/k", "value");

        let m = store.metrics().unwrap();
        assert_eq!(m.level_bytes(), 7);
        assert_eq!(m.wal_bytes, 7);

        store.flush().unwrap();
        let m = store.metrics().unwrap();
        assert_eq!(m.level_bytes(), 7);
        assert_eq!(m.wal_bytes, 0);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = MemStore::new();
        store
            .kv_write_batch(
                vec![
                    WriteOp::Put {
                        key: Bytes::from("/x"),
                        value: Bytes::from("1"),
                    },
                    WriteOp::Delete {
                        key: Bytes::from("/x"),
                    },
                    WriteOp::Put {
                        key: Bytes::from("/y"),
                        value: Bytes::from("2"),
                    },
                ],
                WriteOptions::default(),
            )
            .unwrap();

        assert!(store.kv_get(b"/x").unwrap().is_none());
        assert_eq!(store.kv_get(b"/y").unwrap(), Some(Bytes::from("2")));
    }
}
