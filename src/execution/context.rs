use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::txn::{LockManager, Transaction};

/// Shared handles every executor in a pipeline gets: the catalog for
/// metadata, the running transaction for timestamp stamping, the lock
/// manager for the heap calls, and the buffer pool.
pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub txn: Arc<Transaction>,
    pub lock_manager: Arc<LockManager>,
    pub bpm: Arc<BufferPoolManager>,
}

impl ExecutorContext {
    pub fn new(
        catalog: Arc<Catalog>,
        txn: Arc<Transaction>,
        lock_manager: Arc<LockManager>,
        bpm: Arc<BufferPoolManager>,
    ) -> Self {
        Self {
            catalog,
            txn,
            lock_manager,
            bpm,
        }
    }
}
