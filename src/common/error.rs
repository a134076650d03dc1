use thiserror::Error;

use super::types::PageId;

/// Database error types
#[derive(Error, Debug)]
pub enum KilnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Record of {len} bytes does not fit in a page")]
    RecordTooLarge { len: usize },

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Tuple bytes are corrupted: {0}")]
    TupleCorrupted(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Index {0} not found")]
    IndexNotFound(u32),

    #[error("Unsupported index key: {0}")]
    IndexKey(String),

    #[error("Expression error: {0}")]
    Expression(String),
}

pub type Result<T> = std::result::Result<T, KilnError>;
