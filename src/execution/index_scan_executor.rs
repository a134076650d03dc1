use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{KilnError, RecordId, Result};
use crate::index::BPlusTreeIndex;
use crate::tuple::{Schema, Tuple};

use super::context::ExecutorContext;
use super::executor::Executor;
use super::plan::IndexScanPlanNode;

/// Fetches rows through an index. Two modes, resolved at init:
///
/// - point mode (`pred_keys` non-empty): each key expression is evaluated
///   without an input row, looked up with `scan_key`, and the resulting
///   rids de-duplicated (ORed equalities may repeat a key);
/// - ordered mode: the whole leaf level is walked front to back.
///
/// `next` then fetches each collected rid, skipping tuples whose meta says
/// deleted.
pub struct IndexScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: IndexScanPlanNode,
    table_info: Option<Arc<TableInfo>>,
    rids: Vec<RecordId>,
    cursor: usize,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: IndexScanPlanNode) -> Self {
        Self {
            ctx,
            plan,
            table_info: None,
            rids: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        let catalog = &self.ctx.catalog;
        let index_info = catalog
            .get_index(self.plan.index_oid)
            .ok_or(KilnError::IndexNotFound(self.plan.index_oid))?;
        let table_info = catalog
            .get_table(self.plan.table_oid)
            .ok_or_else(|| KilnError::TableNotFound(self.plan.table_oid.to_string()))?;

        self.rids.clear();
        self.cursor = 0;

        if !self.plan.pred_keys.is_empty() {
            // Point lookups, one per key expression, de-duplicated.
            let mut seen = HashSet::new();
            for key_expr in &self.plan.pred_keys {
                let key_value = key_expr.evaluate(None, &table_info.schema)?;
                let key_tuple = Tuple::new(index_info.key_schema.clone(), vec![key_value]);
                for rid in index_info.index.scan_key(&key_tuple, &self.ctx.txn)? {
                    if seen.insert(rid) {
                        self.rids.push(rid);
                    }
                }
            }
        } else {
            // Ordered mode walks the concrete B+Tree's leaf chain.
            let btree = index_info
                .index
                .as_any()
                .downcast_ref::<BPlusTreeIndex>()
                .ok_or_else(|| {
                    KilnError::IndexKey("ordered scan requires a B+Tree index".to_string())
                })?;
            let mut iter = btree.tree().begin()?;
            while !iter.is_end() {
                let (_key, rid) = iter.entry();
                self.rids.push(rid);
                iter.advance()?;
            }
        }

        self.table_info = Some(table_info);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let table_info = self.table_info.as_ref().expect("init() resolves the table");

        while self.cursor < self.rids.len() {
            let rid = self.rids[self.cursor];
            self.cursor += 1;

            let (meta, tuple) = table_info.table.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
