use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::{
    IndexOid, KilnError, Result, TableOid, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
};
use crate::index::{BPlusTreeIndex, Index};
use crate::storage::table::TableHeap;
use crate::tuple::Schema;
use crate::txn::Transaction;

/// Everything known about one table.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Arc<Schema>,
    pub table: Arc<TableHeap>,
}

/// Everything known about one index.
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub key_schema: Arc<Schema>,
    pub index: Arc<dyn Index>,
}

/// In-memory registry of tables and indexes, keyed by oid with name
/// lookups on the side. Persistence of the catalog itself is out of scope;
/// the data pages it points to live in the buffer pool.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<TableOid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, TableOid>>,
    indexes: RwLock<HashMap<IndexOid, Arc<IndexInfo>>>,
    table_indexes: RwLock<HashMap<String, Vec<IndexOid>>>,
    next_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_oid: AtomicU32::new(0),
        }
    }

    pub fn create_table(&self, name: &str, schema: Arc<Schema>) -> Result<Arc<TableInfo>> {
        if self.table_names.read().contains_key(name) {
            return Err(KilnError::TableAlreadyExists(name.to_string()));
        }

        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(TableHeap::create(self.bpm.clone(), schema.clone())?);
        let info = Arc::new(TableInfo {
            oid,
            name: name.to_string(),
            schema,
            table,
        });

        self.tables.write().insert(oid, info.clone());
        self.table_names.write().insert(name.to_string(), oid);
        self.table_indexes.write().entry(name.to_string()).or_default();
        info!("created table '{name}' (oid {oid})");
        Ok(info)
    }

    /// Builds a B+Tree index over `key_attrs` of an existing table and
    /// backfills it from the rows already in the heap.
    pub fn create_index(
        &self,
        name: &str,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>> {
        let table_info = self
            .get_table_by_name(table_name)
            .ok_or_else(|| KilnError::TableNotFound(table_name.to_string()))?;

        let key_schema = Arc::new(
            table_info
                .schema
                .project(&key_attrs)
                .ok_or_else(|| KilnError::IndexKey("key attrs out of range".to_string()))?,
        );

        let index = BPlusTreeIndex::new(
            self.bpm.clone(),
            key_schema.clone(),
            key_attrs,
            DEFAULT_LEAF_MAX_SIZE,
            DEFAULT_INTERNAL_MAX_SIZE,
        )?;

        // Backfill from the live rows.
        let txn = Transaction::new(0);
        let mut iter = table_info.table.make_iterator();
        while let Some(rid) = iter.next_rid()? {
            let (meta, tuple) = table_info.table.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            let key = tuple.key_from_tuple(&key_schema, index.key_attrs())?;
            index.insert_entry(&key, rid, &txn)?;
        }

        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(IndexInfo {
            oid,
            name: name.to_string(),
            table_name: table_name.to_string(),
            key_schema,
            index: Arc::new(index),
        });

        self.indexes.write().insert(oid, info.clone());
        self.table_indexes
            .write()
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        info!("created index '{name}' (oid {oid}) on '{table_name}'");
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.tables.read().get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let oid = *self.table_names.read().get(name)?;
        self.get_table(oid)
    }

    pub fn get_index(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.indexes.read().get(&oid).cloned()
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let table_indexes = self.table_indexes.read();
        let indexes = self.indexes.read();
        table_indexes
            .get(table_name)
            .map(|oids| {
                oids.iter()
                    .filter_map(|oid| indexes.get(oid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
