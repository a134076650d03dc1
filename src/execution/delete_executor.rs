use std::sync::Arc;

use log::debug;

use crate::common::{KilnError, RecordId, Result};
use crate::storage::table::TupleMeta;
use crate::tuple::{Schema, Tuple, Value};

use super::context::ExecutorContext;
use super::executor::Executor;
use super::plan::DeletePlanNode;

/// For every child row: drop its entry from each index, then mark the
/// stored tuple deleted. Emits a single count row, then EOF.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    plan: DeletePlanNode,
    child: Box<dyn Executor>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: DeletePlanNode, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            done: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }

        let catalog = &self.ctx.catalog;
        let table_info = catalog
            .get_table(self.plan.table_oid)
            .ok_or_else(|| KilnError::TableNotFound(self.plan.table_oid.to_string()))?;
        let indexes = catalog.get_table_indexes(&table_info.name);

        let mut delete_count = 0i32;
        while let Some((tuple, rid)) = self.child.next()? {
            for index_info in &indexes {
                let key =
                    tuple.key_from_tuple(&index_info.key_schema, index_info.index.key_attrs())?;
                index_info.index.delete_entry(&key, rid, &self.ctx.txn)?;
            }

            table_info.table.update_tuple_meta(
                TupleMeta {
                    ts: self.ctx.txn.temp_ts(),
                    is_deleted: true,
                },
                rid,
            )?;
            delete_count += 1;
        }
        debug!("deleted {delete_count} rows from '{}'", table_info.name);

        self.done = true;
        let count = Tuple::new(
            self.plan.output_schema.clone(),
            vec![Value::Integer(delete_count)],
        );
        Ok(Some((count, RecordId::invalid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
