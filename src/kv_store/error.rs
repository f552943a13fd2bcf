use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvStoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("db internal error: {0}")]
    Backend(String),
    #[error("iterator is not positioned on an entry")]
    InvalidIterator,
}

impl KvStoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        KvStoreError::Backend(err.to_string())
    }
}

impl From<sled::Error> for KvStoreError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(e) => KvStoreError::Io(e),
            e => KvStoreError::backend(e),
        }
    }
}

pub type KvResult<T> = std::result::Result<T, KvStoreError>;
