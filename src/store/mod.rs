//! Record store: the persisted ledger of signup identifiers and outcomes.

mod generator;
mod records;

pub use generator::{generate_batch, DEFAULT_PREFIX};
pub use records::{CollisionPolicy, RecordStore, Status, WorkItem, STORE_HEADER};

use thiserror::Error;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store file: {0}")]
    Malformed(String),

    #[error("no record matching identifier: {0}")]
    NotFound(String),
}
