use thiserror::Error;

use crate::kv_store::KvStoreError;

#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("datastore: key not found")]
    NotFound,
    #[error("datastore is closed")]
    Closed,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] KvStoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatastoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatastoreError::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, DatastoreError>;
