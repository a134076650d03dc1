use std::sync::Arc;

use log::debug;

use crate::common::{KilnError, RecordId, Result};
use crate::storage::table::TupleMeta;
use crate::tuple::{Schema, Tuple, Value};

use super::context::ExecutorContext;
use super::executor::Executor;
use super::plan::InsertPlanNode;

/// Drains its child, appending every row to the table heap stamped with
/// the transaction's temporary timestamp, and maintains every index on the
/// table. Emits a single count row, then EOF.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    plan: InsertPlanNode,
    child: Box<dyn Executor>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: InsertPlanNode, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            done: false,
        }
    }
}

impl Executor for InsertExecutor {
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

        let mut insert_count = 0i32;
        while let Some((tuple, _rid)) = self.child.next()? {
            let meta = TupleMeta {
                ts: self.ctx.txn.temp_ts(),
                is_deleted: false,
            };
            let inserted_rid = table_info.table.insert_tuple(
                meta,
                &tuple,
                &self.ctx.lock_manager,
                &self.ctx.txn,
                self.plan.table_oid,
            )?;

            if let Some(rid) = inserted_rid {
                insert_count += 1;
                for index_info in &indexes {
                    let key =
                        tuple.key_from_tuple(&index_info.key_schema, index_info.index.key_attrs())?;
                    index_info.index.insert_entry(&key, rid, &self.ctx.txn)?;
                }
            }
        }
        debug!("inserted {insert_count} rows into '{}'", table_info.name);

        self.done = true;
        let count = Tuple::new(
            self.plan.output_schema.clone(),
            vec![Value::Integer(insert_count)],
        );
        Ok(Some((count, RecordId::invalid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
