use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{IndexKey, PageId, RecordId, Result};

use super::btree_page::BTreeLeafPage;

/// Forward cursor over the sibling-linked leaf level.
///
/// The iterator keeps a read guard on its current leaf for as long as it
/// points into it; crossing a leaf boundary releases that guard before the
/// next leaf is latched. The end sentinel holds no guard and no page id.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    page_id: Option<PageId>,
    index: usize,
    guard: Option<ReadPageGuard>,
}

impl BTreeIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        page_id: PageId,
        index: usize,
        guard: ReadPageGuard,
    ) -> Self {
        Self {
            bpm,
            page_id: Some(page_id),
            index,
            guard: Some(guard),
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            page_id: None,
            index: 0,
            guard: None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.page_id.is_none()
    }

    /// The entry under the cursor.
    ///
    /// # Panics
    /// Panics when called on the end iterator.
    pub fn entry(&self) -> (IndexKey, RecordId) {
        let guard = self.guard.as_ref().expect("dereferencing end iterator");
        let leaf = BTreeLeafPage::new(guard.data());
        (leaf.key_at(self.index), leaf.rid_at(self.index))
    }

    /// Steps forward, crossing to the next leaf (or the end) when the
    /// current one is exhausted.
    ///
    /// # Panics
    /// Panics when called on the end iterator.
    pub fn advance(&mut self) -> Result<()> {
        let next = {
            let guard = self.guard.as_ref().expect("advancing end iterator");
            let leaf = BTreeLeafPage::new(guard.data());
            self.index += 1;
            if self.index < leaf.size() {
                return Ok(());
            }
            leaf.next_page_id()
        };

        // Release the current leaf before latching its successor.
        self.guard = None;
        self.index = 0;
        match next {
            Some(next_id) => {
                self.guard = Some(self.bpm.read_page(next_id)?);
                self.page_id = Some(next_id);
            }
            None => self.page_id = None,
        }
        Ok(())
    }
}

impl PartialEq for BTreeIterator {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && self.index == other.index
    }
}

impl Eq for BTreeIterator {}

impl Iterator for BTreeIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let entry = self.entry();
        match self.advance() {
            Ok(()) => Some(Ok(entry)),
            Err(e) => Some(Err(e)),
        }
    }
}
