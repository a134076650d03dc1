//! Kiln - the core of a disk-oriented relational storage and query engine.
//!
//! The system stores data on persistent storage and caches pages in a
//! buffer pool; everything above reaches pages through RAII latch guards.
//!
//! # Architecture
//!
//! - **Storage** (`storage`): disk I/O and page organization
//!   - `DiskManager` / `DiskScheduler`: page file plus async I/O worker
//!   - `TablePage` / `TableHeap`: slotted pages chained into a heap, every
//!     tuple stamped with `(ts, is_deleted)` metadata
//!
//! - **Buffer pool** (`buffer`): memory management for pages
//!   - `BufferPoolManager`: page cache with pin counts and dirty tracking
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `ReadPageGuard` / `WritePageGuard`: latch-holding page handles
//!
//! - **Index** (`index`): a paged, concurrent B+Tree
//!   - `BPlusTree`: root-to-leaf search, insert with cascading splits,
//!     remove with borrow/merge, all under page-granular latch crabbing
//!   - `BTreeIterator`: forward cursor across the sibling-linked leaves
//!   - `Index` / `BPlusTreeIndex`: the key-tuple facade the executors use
//!
//! - **Execution** (`execution`): pull-based operators (values, seq scan,
//!   index scan, insert, delete, update) over an expression tree
//!
//! - **Optimizer** (`optimizer`): the seq-scan to index-scan rewrite for
//!   equality and OR-of-equality filters on an indexed column
//!
//! - **Catalog** (`catalog`): in-memory table and index registry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln::buffer::BufferPoolManager;
//! use kiln::index::BPlusTree;
//! use kiln::storage::disk::DiskManager;
//! use kiln::common::{RecordId, PageId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("kiln.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree = BPlusTree::new(bpm, 128, 128).unwrap();
//! let rid = RecordId::new(PageId::new(7), SlotId::new(0));
//! tree.insert(42, rid).unwrap();
//! assert_eq!(tree.get_value(42).unwrap(), Some(rid));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod index;
pub mod optimizer;
pub mod storage;
pub mod tuple;
pub mod txn;

pub use common::{KilnError, PageId, RecordId, Result, SlotId};
