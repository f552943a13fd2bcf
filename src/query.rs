//! Prefix queries over engine snapshots.
//!
//! Every query pins its own snapshot, seeks a cursor to the normalized
//! prefix and walks forward until the first key outside the prefix. Results
//! are collected eagerly: memory grows with the number of matches, and in
//! exchange the snapshot and cursor never outlive [`run_query`].

use bytes::Bytes;
use tracing::{debug, error};
use typed_builder::TypedBuilder;

use crate::error::Result;
use crate::key::{normalize_prefix, Key};
use crate::kv_store::{KvIterator, KvSnapshot, KvStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct Query {
    /// Key prefix to match. A missing leading `/` is added before scanning.
    #[builder(default, setter(into))]
    pub prefix: String,
    /// Leave `Entry::value` empty.
    #[builder(default)]
    pub keys_only: bool,
    /// Fill `Entry::size`, also in keys-only mode.
    #[builder(default)]
    pub returns_sizes: bool,
    /// Matching entries to skip before emitting.
    #[builder(default)]
    pub offset: usize,
    /// Maximum entries to emit; 0 means no limit.
    #[builder(default)]
    pub limit: usize,
}

impl Query {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Bytes>,
    pub size: Option<usize>,
}

/// Matches of one query, in ascending key order.
#[derive(Debug, Clone)]
pub struct QueryResults {
    query: Query,
    entries: Vec<Entry>,
}

impl QueryResults {
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Consumes the results.
    pub fn rest(self) -> Vec<Entry> {
        self.entries
    }
}

impl IntoIterator for QueryResults {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub fn run_query<S: KvStore>(store: &S, query: Query) -> Result<QueryResults> {
    let snapshot = store
        .snapshot()
        .inspect_err(|e| error!("failed to take snapshot, err: {e}"))?;

    let entries = scan(&snapshot, &query)
        .inspect_err(|e| error!("query {:?} aborted, err: {e}", query.prefix))?;
    drop(snapshot);

    debug!(
        "query prefix {:?} matched {} entries",
        query.prefix,
        entries.len()
    );
    Ok(QueryResults { query, entries })
}

/// Walks `snapshot` from the normalized prefix. The cursor is dropped on
/// every return path.
pub fn scan<S: KvSnapshot>(snapshot: &S, query: &Query) -> Result<Vec<Entry>> {
    let prefix = normalize_prefix(&query.prefix);
    let prefix = prefix.as_bytes();
    let lower_bound = (!prefix.is_empty()).then_some(prefix);

    let mut iter = snapshot.iter(lower_bound)?;
    let mut valid = iter.seek_ge(prefix)?;

    let mut skipped = 0;
    let mut entries = Vec::new();
    while valid && iter.key().starts_with(prefix) {
        if query.limit > 0 && entries.len() >= query.limit {
            break;
        }
        if skipped < query.offset {
            skipped += 1;
            valid = iter.next()?;
            continue;
        }

        let key = Key::from_bytes(iter.key())?;
        let (value, size) = if query.keys_only && !query.returns_sizes {
            (None, None)
        } else {
            let value = iter.value()?;
            let size = query.returns_sizes.then(|| value.len());
            ((!query.keys_only).then_some(value), size)
        };
        entries.push(Entry { key, value, size });

        valid = iter.next()?;
    }

    Ok(entries)
}
