use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{IndexKey, KilnError, PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::{BTreeHeaderPage, BTreeInternalPage, BTreeLeafPage, BTreePage};
use super::BTreeIterator;

/// Per-operation bookkeeping for a descent: the latched header page, the
/// stack of write guards from the root down (ancestors stay latched until
/// the operation proves it no longer needs them), and the root id observed
/// under the header latch.
struct Context {
    header: Option<WritePageGuard>,
    write_set: Vec<WritePageGuard>,
    root_page_id: PageId,
}

impl Context {
    fn new() -> Self {
        Self {
            header: None,
            write_set: Vec::new(),
            root_page_id: INVALID_PAGE_ID,
        }
    }

    fn is_root_page(&self, page_id: PageId) -> bool {
        self.root_page_id == page_id
    }

    fn set_root(&mut self, page_id: PageId) {
        let header = self.header.as_mut().expect("header latched for write");
        BTreeHeaderPage::new(header.data_mut()).set_root_page_id(page_id);
        self.root_page_id = page_id;
    }
}

/// A paged B+Tree mapping integer keys to record ids.
///
/// Concurrency is page-granular latch crabbing: reads couple latches down
/// the tree, releasing each parent once the child is held; writes latch the
/// header and then every page on the descent path, so structure changes can
/// propagate upward through pages that are still held. Sibling pages
/// touched by splits, merges, and borrows are latched on demand while their
/// parent is held, and released before it.
pub struct BPlusTree {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    /// Creates a tree anchored at a fresh header page; the tree starts
    /// empty.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let header_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.write_page(header_page_id)?;
            BTreeHeaderPage::new(guard.data_mut()).init();
        }
        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Reattaches to an existing header page.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        header_page_id: PageId,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// INVALID_PAGE_ID when the tree is empty.
    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.read_page(self.header_page_id)?;
        Ok(BTreeHeaderPage::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root_page_id()? == INVALID_PAGE_ID)
    }

    /// Frees a page that is no longer reachable from the tree. A reader
    /// that latched it through a sibling pointer read before the unlink
    /// may still pin it; the free is then skipped rather than failing the
    /// structural operation.
    fn discard_page(&self, page_id: PageId) -> Result<()> {
        match self.bpm.delete_page(page_id) {
            Ok(_) => Ok(()),
            Err(KilnError::PageStillPinned(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Point lookup. Read latches couple down the tree.
    pub fn get_value(&self, key: IndexKey) -> Result<Option<RecordId>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = BTreeHeaderPage::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        loop {
            if BTreePage::new(guard.data()).is_leaf() {
                return Ok(BTreeLeafPage::new(guard.data()).lookup(key));
            }
            let child_id = {
                let internal = BTreeInternalPage::new(guard.data());
                internal.child_at(internal.key_index(key))
            };
            let child_guard = self.bpm.read_page(child_id)?;
            guard = child_guard;
        }
    }

    /// Inserts `key -> rid`. Returns false (tree untouched) on duplicate.
    pub fn insert(&self, key: IndexKey, rid: RecordId) -> Result<bool> {
        let mut ctx = Context::new();
        let mut header_guard = self.bpm.write_page(self.header_page_id)?;
        let root_id = BTreeHeaderPage::new(header_guard.data()).root_page_id();

        // Empty tree: the new leaf is the root.
        if root_id == INVALID_PAGE_ID {
            let leaf_id = self.bpm.new_page()?;
            {
                let mut leaf_guard = self.bpm.write_page(leaf_id)?;
                let mut leaf = BTreeLeafPage::new(leaf_guard.data_mut());
                leaf.init(leaf_id, self.leaf_max_size);
                leaf.insert(key, rid);
            }
            BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(leaf_id);
            return Ok(true);
        }

        ctx.root_page_id = root_id;
        ctx.header = Some(header_guard);
        ctx.write_set.push(self.bpm.write_page(root_id)?);

        loop {
            let is_leaf = {
                let top = ctx.write_set.last().expect("descent holds a page");
                BTreePage::new(top.data()).is_leaf()
            };

            if is_leaf {
                let mut leaf_guard = ctx.write_set.pop().expect("descent holds the leaf");
                let leaf_id = leaf_guard.page_id();
                let mut leaf = BTreeLeafPage::new(leaf_guard.data_mut());

                if !leaf.insert(key, rid) {
                    return Ok(false);
                }
                if leaf.size() <= leaf.max_size() {
                    return Ok(true);
                }

                // Over-full: split off a right sibling and push the middle
                // key into the parent.
                let right_id = self.bpm.new_page()?;
                let mut right_guard = self.bpm.write_page(right_id)?;
                let mut right = BTreeLeafPage::new(right_guard.data_mut());
                right.init(right_id, self.leaf_max_size);
                let middle_key = leaf.split_into(&mut right);
                let old_next = right.next_page_id();
                debug!("leaf {leaf_id} split at {middle_key} into {right_id}");

                drop(right);
                drop(leaf);
                drop(right_guard);
                drop(leaf_guard);

                if let Some(next_id) = old_next {
                    let mut next_guard = self.bpm.write_page(next_id)?;
                    BTreeLeafPage::new(next_guard.data_mut()).set_prev_page_id(Some(right_id));
                }

                self.insert_into_parent(&mut ctx, leaf_id, middle_key, right_id)?;
                return Ok(true);
            }

            let child_id = {
                let top = ctx.write_set.last().expect("descent holds a page");
                let internal = BTreeInternalPage::new(top.data());
                internal.child_at(internal.key_index(key))
            };
            ctx.write_set.push(self.bpm.write_page(child_id)?);
        }
    }

    /// Propagates a split upward: link `right_id` (with separator `middle`)
    /// next to `left_id` in its parent, splitting ancestors as long as they
    /// overflow.
    fn insert_into_parent(
        &self,
        ctx: &mut Context,
        mut left_id: PageId,
        mut middle: IndexKey,
        mut right_id: PageId,
    ) -> Result<()> {
        loop {
            if ctx.is_root_page(left_id) {
                // The split node was the root: grow the tree by one level.
                let new_root_id = self.bpm.new_page()?;
                {
                    let mut root_guard = self.bpm.write_page(new_root_id)?;
                    let mut root = BTreeInternalPage::new(root_guard.data_mut());
                    root.init(new_root_id, self.internal_max_size);
                    root.populate_new_root(left_id, middle, right_id);
                }
                debug!("new root {new_root_id}");
                ctx.set_root(new_root_id);
                return Ok(());
            }

            let mut parent_guard = ctx
                .write_set
                .pop()
                .expect("split propagation requires a latched parent");
            let parent_id = parent_guard.page_id();
            let mut parent = BTreeInternalPage::new(parent_guard.data_mut());

            parent.insert_node_after(left_id, middle, right_id);
            if parent.size() <= parent.max_size() {
                return Ok(());
            }

            let sibling_id = self.bpm.new_page()?;
            let mut sibling_guard = self.bpm.write_page(sibling_id)?;
            let mut sibling = BTreeInternalPage::new(sibling_guard.data_mut());
            sibling.init(sibling_id, self.internal_max_size);
            middle = parent.split_into(&mut sibling);
            debug!("internal {parent_id} split at {middle} into {sibling_id}");

            left_id = parent_id;
            right_id = sibling_id;
        }
    }

    /// Removes `key`. Absent keys are a no-op.
    pub fn remove(&self, key: IndexKey) -> Result<()> {
        let mut ctx = Context::new();
        let header_guard = self.bpm.write_page(self.header_page_id)?;
        let root_id = BTreeHeaderPage::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }

        ctx.root_page_id = root_id;
        ctx.header = Some(header_guard);
        ctx.write_set.push(self.bpm.write_page(root_id)?);

        loop {
            let is_leaf = {
                let top = ctx.write_set.last().expect("descent holds a page");
                BTreePage::new(top.data()).is_leaf()
            };

            if is_leaf {
                let mut leaf_guard = ctx.write_set.pop().expect("descent holds the leaf");
                let leaf_id = leaf_guard.page_id();
                let mut leaf = BTreeLeafPage::new(leaf_guard.data_mut());

                if !leaf.remove(key) {
                    return Ok(());
                }

                if ctx.is_root_page(leaf_id) {
                    if leaf.size() == 0 {
                        drop(leaf);
                        drop(leaf_guard);
                        self.discard_page(leaf_id)?;
                        ctx.set_root(INVALID_PAGE_ID);
                        debug!("tree emptied");
                    }
                    return Ok(());
                }
                if leaf.size() >= leaf.min_size() {
                    return Ok(());
                }

                drop(leaf);
                ctx.write_set.push(leaf_guard);
                return self.fix_underflow(&mut ctx);
            }

            let child_id = {
                let top = ctx.write_set.last().expect("descent holds a page");
                let internal = BTreeInternalPage::new(top.data());
                internal.child_at(internal.key_index(key))
            };
            ctx.write_set.push(self.bpm.write_page(child_id)?);
        }
    }

    /// Repairs the under-full node on top of the write set, walking the
    /// ancestor stack iteratively as merges push the underflow upward.
    fn fix_underflow(&self, ctx: &mut Context) -> Result<()> {
        loop {
            let Some(mut curr_guard) = ctx.write_set.pop() else {
                return Ok(());
            };
            let curr_id = curr_guard.page_id();
            let is_leaf = BTreePage::new(curr_guard.data()).is_leaf();

            if ctx.is_root_page(curr_id) {
                // An internal root with a single child hands the root down
                // one level; a root leaf may be arbitrarily small.
                if !is_leaf {
                    let internal = BTreeInternalPage::new(curr_guard.data());
                    if internal.size() == 1 {
                        let new_root_id = internal.child_at(0);
                        drop(internal);
                        drop(curr_guard);
                        self.discard_page(curr_id)?;
                        ctx.set_root(new_root_id);
                        debug!("root collapsed to {new_root_id}");
                    }
                }
                return Ok(());
            }

            let mut parent_guard = ctx
                .write_set
                .pop()
                .expect("underflow propagation requires a latched parent");
            let parent_id = parent_guard.page_id();

            let (child_index, left_id, right_id) = {
                let parent = BTreeInternalPage::new(parent_guard.data());
                let child_index = parent
                    .child_index(curr_id)
                    .expect("under-full page missing from its parent");
                let left_id = (child_index > 0).then(|| parent.child_at(child_index - 1));
                let right_id =
                    (child_index + 1 < parent.size()).then(|| parent.child_at(child_index + 1));
                (child_index, left_id, right_id)
            };

            // Borrow from the left sibling, then the right.
            if self.try_borrow(
                &mut curr_guard,
                &mut parent_guard,
                left_id,
                child_index,
                is_leaf,
                true,
            )? || self.try_borrow(
                &mut curr_guard,
                &mut parent_guard,
                right_id,
                child_index,
                is_leaf,
                false,
            )? {
                ctx.write_set.push(parent_guard);
                return Ok(());
            }

            // No sibling can spare an entry: merge. Left first.
            if let Some(left_sibling_id) = left_id {
                let mut left_guard = self.bpm.write_page(left_sibling_id)?;
                if is_leaf {
                    let mut left = BTreeLeafPage::new(left_guard.data_mut());
                    let mut curr = BTreeLeafPage::new(curr_guard.data_mut());
                    left.merge_from(&mut curr);
                    let new_next = left.next_page_id();
                    drop(curr);
                    drop(left);
                    if let Some(next_id) = new_next {
                        let mut next_guard = self.bpm.write_page(next_id)?;
                        BTreeLeafPage::new(next_guard.data_mut())
                            .set_prev_page_id(Some(left_sibling_id));
                    }
                } else {
                    let separator = BTreeInternalPage::new(parent_guard.data()).key_at(child_index);
                    let mut left = BTreeInternalPage::new(left_guard.data_mut());
                    let mut curr = BTreeInternalPage::new(curr_guard.data_mut());
                    left.merge_from(&mut curr, separator);
                }
                BTreeInternalPage::new(parent_guard.data_mut()).remove(child_index);
                drop(left_guard);
                drop(curr_guard);
                self.discard_page(curr_id)?;
                debug!("merged {curr_id} into {left_sibling_id}");
            } else if let Some(right_sibling_id) = right_id {
                let mut right_guard = self.bpm.write_page(right_sibling_id)?;
                if is_leaf {
                    let mut curr = BTreeLeafPage::new(curr_guard.data_mut());
                    let mut right = BTreeLeafPage::new(right_guard.data_mut());
                    curr.merge_from(&mut right);
                    let new_next = curr.next_page_id();
                    drop(right);
                    drop(curr);
                    if let Some(next_id) = new_next {
                        let mut next_guard = self.bpm.write_page(next_id)?;
                        BTreeLeafPage::new(next_guard.data_mut()).set_prev_page_id(Some(curr_id));
                    }
                } else {
                    let separator =
                        BTreeInternalPage::new(parent_guard.data()).key_at(child_index + 1);
                    let mut curr = BTreeInternalPage::new(curr_guard.data_mut());
                    let mut right = BTreeInternalPage::new(right_guard.data_mut());
                    curr.merge_from(&mut right, separator);
                }
                BTreeInternalPage::new(parent_guard.data_mut()).remove(child_index + 1);
                drop(right_guard);
                drop(curr_guard);
                self.discard_page(right_sibling_id)?;
                debug!("merged {right_sibling_id} into {curr_id}");
            } else {
                // No siblings at all: the parent holds a single child, which
                // only the root may. Revisit the parent for root collapse.
                drop(curr_guard);
                ctx.write_set.push(parent_guard);
                continue;
            }

            let parent = BTreeInternalPage::new(parent_guard.data());
            if ctx.is_root_page(parent_id) {
                if parent.size() == 1 {
                    let new_root_id = parent.child_at(0);
                    drop(parent);
                    drop(parent_guard);
                    self.discard_page(parent_id)?;
                    ctx.set_root(new_root_id);
                    debug!("root collapsed to {new_root_id}");
                }
                return Ok(());
            }
            if parent.size() < parent.min_size() {
                drop(parent);
                ctx.write_set.push(parent_guard);
                continue;
            }
            return Ok(());
        }
    }

    /// Attempts to move one entry from the given sibling into the
    /// under-full page, updating the parent separator. Returns whether the
    /// redistribution happened.
    fn try_borrow(
        &self,
        curr_guard: &mut WritePageGuard,
        parent_guard: &mut WritePageGuard,
        sibling_id: Option<PageId>,
        child_index: usize,
        is_leaf: bool,
        from_left: bool,
    ) -> Result<bool> {
        let Some(sibling_id) = sibling_id else {
            return Ok(false);
        };
        let mut sibling_guard = self.bpm.write_page(sibling_id)?;

        if is_leaf {
            let mut sibling = BTreeLeafPage::new(sibling_guard.data_mut());
            if sibling.size() <= sibling.min_size() {
                return Ok(false);
            }
            let mut curr = BTreeLeafPage::new(curr_guard.data_mut());

            if from_left {
                // Tail of the left sibling becomes our head; the separator
                // for *us* becomes that key.
                let key = sibling.key_at(sibling.size() - 1);
                let rid = sibling.rid_at(sibling.size() - 1);
                sibling.remove(key);
                curr.insert(key, rid);
                let new_separator = curr.key_at(0);
                drop(curr);
                drop(sibling);
                BTreeInternalPage::new(parent_guard.data_mut())
                    .set_key_at(child_index, new_separator);
            } else {
                // Head of the right sibling becomes our tail; the separator
                // for the *sibling* becomes its new head.
                let key = sibling.key_at(0);
                let rid = sibling.rid_at(0);
                sibling.remove(key);
                curr.insert(key, rid);
                let new_separator = sibling.key_at(0);
                drop(curr);
                drop(sibling);
                BTreeInternalPage::new(parent_guard.data_mut())
                    .set_key_at(child_index + 1, new_separator);
            }
        } else {
            let mut sibling = BTreeInternalPage::new(sibling_guard.data_mut());
            if sibling.size() <= sibling.min_size() {
                return Ok(false);
            }
            let mut curr = BTreeInternalPage::new(curr_guard.data_mut());

            if from_left {
                // The separator descends to our front; the sibling's last
                // key ascends to replace it.
                let separator = {
                    let parent = BTreeInternalPage::new(parent_guard.data());
                    parent.key_at(child_index)
                };
                let moved_child = sibling.child_at(sibling.size() - 1);
                let key_up = sibling.key_at(sibling.size() - 1);
                sibling.remove(sibling.size() - 1);
                curr.insert_front(separator, moved_child);
                drop(curr);
                drop(sibling);
                BTreeInternalPage::new(parent_guard.data_mut()).set_key_at(child_index, key_up);
            } else {
                // The separator descends to our back; the sibling's first
                // key ascends to replace it.
                let separator = {
                    let parent = BTreeInternalPage::new(parent_guard.data());
                    parent.key_at(child_index + 1)
                };
                let moved_child = sibling.child_at(0);
                let key_up = sibling.key_at(1);
                sibling.remove(0);
                curr.insert_back(separator, moved_child);
                drop(curr);
                drop(sibling);
                BTreeInternalPage::new(parent_guard.data_mut()).set_key_at(child_index + 1, key_up);
            }
        }

        debug!(
            "borrowed into under-full page from {} sibling {sibling_id}",
            if from_left { "left" } else { "right" }
        );
        Ok(true)
    }

    /// Iterator positioned at the first key of the tree.
    pub fn begin(&self) -> Result<BTreeIterator> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = BTreeHeaderPage::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(BTreeIterator::end(self.bpm.clone()));
        }

        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);
        loop {
            if BTreePage::new(guard.data()).is_leaf() {
                let page_id = guard.page_id();
                return Ok(BTreeIterator::new(self.bpm.clone(), page_id, 0, guard));
            }
            let child_id = BTreeInternalPage::new(guard.data()).child_at(0);
            let child_guard = self.bpm.read_page(child_id)?;
            guard = child_guard;
        }
    }

    /// Iterator positioned at the first key `>= key`.
    pub fn begin_at(&self, key: IndexKey) -> Result<BTreeIterator> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = BTreeHeaderPage::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(BTreeIterator::end(self.bpm.clone()));
        }

        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);
        loop {
            if BTreePage::new(guard.data()).is_leaf() {
                let leaf = BTreeLeafPage::new(guard.data());
                let index = leaf.key_index(key);
                let page_id = leaf.page_id();
                // The lower bound may fall past the last slot of the
                // rightmost leaf; that is the end of the tree.
                if index >= leaf.size() {
                    let next = leaf.next_page_id();
                    drop(leaf);
                    drop(guard);
                    return match next {
                        Some(next_id) => {
                            let next_guard = self.bpm.read_page(next_id)?;
                            Ok(BTreeIterator::new(self.bpm.clone(), next_id, 0, next_guard))
                        }
                        None => Ok(BTreeIterator::end(self.bpm.clone())),
                    };
                }
                drop(leaf);
                return Ok(BTreeIterator::new(self.bpm.clone(), page_id, index, guard));
            }
            let child_id = {
                let internal = BTreeInternalPage::new(guard.data());
                internal.child_at(internal.key_index(key))
            };
            let child_guard = self.bpm.read_page(child_id)?;
            guard = child_guard;
        }
    }

    /// The end sentinel.
    pub fn end(&self) -> BTreeIterator {
        BTreeIterator::end(self.bpm.clone())
    }
}
