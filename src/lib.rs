//! Datastore contract (put / get / has / get_size / delete / query / batch /
//! disk usage) on top of an embedded ordered key-value engine.
//!
//! ```no_run
//! use sled_datastore::{Datastore, Key, Query};
//!
//! let ds = Datastore::open_path("/tmp/ds")?;
//! ds.put(&Key::new("keks"), b"hello world")?;
//! for entry in ds.query(Query::prefix("keks"))? {
//!     println!("{}", entry.key);
//! }
//! ds.close()?;
//! # Ok::<(), sled_datastore::DatastoreError>(())
//! ```

pub mod batch;
pub mod config;
pub mod datastore;
pub mod error;
pub mod key;
pub mod kv_store;
pub mod query;

pub use batch::Batch;
pub use config::{Configuration, DatastoreOptions};
pub use datastore::Datastore;
pub use error::{DatastoreError, Result};
pub use key::{normalize_prefix, Key};
pub use query::{Entry, Query, QueryResults};
