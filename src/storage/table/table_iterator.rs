use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, SlotId};
use crate::storage::page::TablePage;

/// Forward cursor over every record id in a table heap, in page-chain and
/// slot order. The current page is read-latched only for the duration of
/// each step, so no latch is held between calls.
pub struct TableIterator {
    bpm: Arc<BufferPoolManager>,
    page_id: Option<PageId>,
    slot: u16,
}

impl TableIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            page_id: Some(first_page_id),
            slot: 0,
        }
    }

    /// The next record id, or None at the end of the heap. Deleted tuples
    /// are still yielded; callers filter on their meta.
    pub fn next_rid(&mut self) -> Result<Option<RecordId>> {
        while let Some(page_id) = self.page_id {
            let next = {
                let guard = self.bpm.read_page(page_id)?;
                let page = TablePage::new(guard.data());
                if self.slot < page.record_count() {
                    let rid = RecordId::new(page_id, SlotId::new(self.slot));
                    self.slot += 1;
                    return Ok(Some(rid));
                }
                page.next_page_id()
            };
            self.page_id = next;
            self.slot = 0;
        }
        Ok(None)
    }
}

impl Iterator for TableIterator {
    type Item = Result<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_rid().transpose()
    }
}
