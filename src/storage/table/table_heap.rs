use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, TableOid, Timestamp};
use crate::storage::page::TablePage;
use crate::tuple::{Schema, Tuple};
use crate::txn::{LockManager, Transaction};

use super::TableIterator;

/// Metadata stamped ahead of every stored tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    pub ts: Timestamp,
    pub is_deleted: bool,
}

impl TupleMeta {
    pub const SIZE: usize = 9;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..8].copy_from_slice(&self.ts.to_le_bytes());
        bytes[8] = u8::from(self.is_deleted);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let ts = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        Self {
            ts,
            is_deleted: bytes[8] != 0,
        }
    }
}

/// Physical storage for one table: a forward-linked chain of slotted
/// pages, each record prefixed by its [`TupleMeta`]. Deletion is a logical
/// mark on the meta; slots are never reused.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    first_page_id: PageId,
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    pub fn create(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>) -> Result<Self> {
        let first_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.write_page(first_page_id)?;
            TablePage::new(guard.data_mut()).init(first_page_id);
        }
        Ok(Self {
            bpm,
            schema,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple stamped with `meta`. Returns None when the tuple can
    /// never fit in a page. The lock manager and transaction are threaded
    /// through for the concurrency layers above this one.
    pub fn insert_tuple(
        &self,
        meta: TupleMeta,
        tuple: &Tuple,
        _lock_mgr: &LockManager,
        _txn: &Transaction,
        _table_oid: TableOid,
    ) -> Result<Option<RecordId>> {
        let mut record = meta.to_bytes().to_vec();
        record.extend(tuple.to_bytes()?);

        // A record that cannot fit even in an empty page is rejected, not
        // chased with an endless chain of fresh pages.
        if record.len() > TablePage::<&[u8]>::MAX_RECORD_LEN {
            return Ok(None);
        }

        // Serialize appenders on the last-page cursor.
        let mut last_page_id = self.last_page_id.lock();

        let mut guard = self.bpm.write_page(*last_page_id)?;
        let mut page = TablePage::new(guard.data_mut());
        if page.can_insert(record.len()) {
            let slot_id = page.insert_record(&record)?;
            return Ok(Some(RecordId::new(*last_page_id, slot_id)));
        }

        let new_page_id = self.bpm.new_page()?;
        let mut new_guard = self.bpm.write_page(new_page_id)?;
        let mut new_page = TablePage::new(new_guard.data_mut());
        new_page.init(new_page_id);
        let slot_id = new_page.insert_record(&record)?;

        page.set_next_page_id(Some(new_page_id));
        *last_page_id = new_page_id;
        debug!("table heap grew to {new_page_id}");

        Ok(Some(RecordId::new(new_page_id, slot_id)))
    }

    pub fn get_tuple(&self, rid: RecordId) -> Result<(TupleMeta, Tuple)> {
        let guard = self.bpm.read_page(rid.page_id)?;
        let page = TablePage::new(guard.data());
        let record = page.record(rid.slot_id)?;
        let meta = TupleMeta::from_bytes(&record[..TupleMeta::SIZE]);
        let tuple = Tuple::from_bytes(self.schema.clone(), &record[TupleMeta::SIZE..])?;
        Ok((meta, tuple))
    }

    /// Overwrites the meta prefix of a stored tuple in place.
    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: RecordId) -> Result<()> {
        let mut guard = self.bpm.write_page(rid.page_id)?;
        let mut page = TablePage::new(guard.data_mut());
        let record = page.record_mut(rid.slot_id)?;
        record[..TupleMeta::SIZE].copy_from_slice(&meta.to_bytes());
        Ok(())
    }

    /// Cursor over every record id in the heap, deleted or not.
    pub fn make_iterator(&self) -> TableIterator {
        TableIterator::new(self.bpm.clone(), self.first_page_id)
    }
}
