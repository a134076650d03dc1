use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{KilnError, RecordId, Result};
use crate::storage::table::TableIterator;
use crate::tuple::{Schema, Tuple, Value};

use super::context::ExecutorContext;
use super::executor::Executor;
use super::plan::SeqScanPlanNode;

/// Walks the table heap in physical order, skipping deleted tuples and
/// rows the filter rejects.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SeqScanPlanNode,
    table_info: Option<Arc<TableInfo>>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: SeqScanPlanNode) -> Self {
        Self {
            ctx,
            plan,
            table_info: None,
            iter: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        let table_info = self
            .ctx
            .catalog
            .get_table(self.plan.table_oid)
            .ok_or_else(|| KilnError::TableNotFound(self.plan.table_oid.to_string()))?;
        self.iter = Some(table_info.table.make_iterator());
        self.table_info = Some(table_info);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let table_info = self.table_info.as_ref().expect("init() resolves the table");
        let iter = self.iter.as_mut().expect("init() opens the iterator");

        while let Some(rid) = iter.next_rid()? {
            let (meta, tuple) = table_info.table.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            if let Some(filter) = &self.plan.filter {
                let keep = filter.evaluate(Some(&tuple), &table_info.schema)?;
                if keep != Value::Boolean(true) {
                    continue;
                }
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
