use std::any::Any;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{IndexKey, KilnError, RecordId, Result};
use crate::tuple::{Schema, Tuple, Value};
use crate::txn::Transaction;

use super::BPlusTree;

/// The seam the executors see: key tuples in, record ids out. A concrete
/// B+Tree over an integer column is the one implementation here; `as_any`
/// lets the ordered-scan path recover it, the way the original engine
/// downcasts its index handle.
pub trait Index: Send + Sync {
    /// Record ids for an exact key (empty when absent).
    fn scan_key(&self, key: &Tuple, txn: &Transaction) -> Result<Vec<RecordId>>;

    /// Inserts a key. Returns false on duplicate.
    fn insert_entry(&self, key: &Tuple, rid: RecordId, txn: &Transaction) -> Result<bool>;

    /// Removes a key. Absent keys are a no-op.
    fn delete_entry(&self, key: &Tuple, rid: RecordId, txn: &Transaction) -> Result<()>;

    /// Column positions (in the table schema) making up the key.
    fn key_attrs(&self) -> &[usize];

    fn key_schema(&self) -> &Arc<Schema>;

    fn as_any(&self) -> &dyn Any;
}

/// B+Tree-backed single-column integer index.
pub struct BPlusTreeIndex {
    key_schema: Arc<Schema>,
    key_attrs: Vec<usize>,
    tree: BPlusTree,
}

impl BPlusTreeIndex {
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        key_schema: Arc<Schema>,
        key_attrs: Vec<usize>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        assert_eq!(
            key_attrs.len(),
            1,
            "B+Tree index keys are a single integer column"
        );
        Ok(Self {
            key_schema,
            key_attrs,
            tree: BPlusTree::new(bpm, leaf_max_size, internal_max_size)?,
        })
    }

    pub fn tree(&self) -> &BPlusTree {
        &self.tree
    }

    /// Pulls the raw integer key out of a key tuple.
    fn index_key(key: &Tuple) -> Result<IndexKey> {
        match key.value(0) {
            Some(Value::Integer(v)) => Ok(*v),
            other => Err(KilnError::IndexKey(format!(
                "expected an INTEGER key column, got {other:?}"
            ))),
        }
    }
}

impl Index for BPlusTreeIndex {
    fn scan_key(&self, key: &Tuple, _txn: &Transaction) -> Result<Vec<RecordId>> {
        let key = Self::index_key(key)?;
        Ok(self.tree.get_value(key)?.into_iter().collect())
    }

    fn insert_entry(&self, key: &Tuple, rid: RecordId, _txn: &Transaction) -> Result<bool> {
        let key = Self::index_key(key)?;
        self.tree.insert(key, rid)
    }

    fn delete_entry(&self, key: &Tuple, _rid: RecordId, _txn: &Transaction) -> Result<()> {
        let key = Self::index_key(key)?;
        self.tree.remove(key)
    }

    fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    fn key_schema(&self) -> &Arc<Schema> {
        &self.key_schema
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
