use std::sync::Arc;

use log::debug;

use crate::common::{KilnError, RecordId, Result};
use crate::storage::table::TupleMeta;
use crate::tuple::{Schema, Tuple, Value};

use super::context::ExecutorContext;
use super::executor::Executor;
use super::plan::UpdatePlanNode;

/// Delete-then-insert update. For every child row: build the new row from
/// the target expressions, unhook the old row from every index, mark it
/// deleted, append the new row, and index it. Emits a single count row.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    plan: UpdatePlanNode,
    child: Box<dyn Executor>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: UpdatePlanNode, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            done: false,
        }
    }
}

impl Executor for UpdateExecutor {
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

        let mut update_count = 0i32;
        while let Some((old_tuple, old_rid)) = self.child.next()? {
            let values: Result<Vec<Value>> = self
                .plan
                .target_expressions
                .iter()
                .map(|expr| expr.evaluate(Some(&old_tuple), self.child.output_schema()))
                .collect();
            let new_tuple = Tuple::new(table_info.schema.clone(), values?);

            for index_info in &indexes {
                let old_key = old_tuple
                    .key_from_tuple(&index_info.key_schema, index_info.index.key_attrs())?;
                index_info
                    .index
                    .delete_entry(&old_key, old_rid, &self.ctx.txn)?;
            }

            table_info.table.update_tuple_meta(
                TupleMeta {
                    ts: self.ctx.txn.temp_ts(),
                    is_deleted: true,
                },
                old_rid,
            )?;

            let new_rid = table_info.table.insert_tuple(
                TupleMeta {
                    ts: self.ctx.txn.temp_ts(),
                    is_deleted: false,
                },
                &new_tuple,
                &self.ctx.lock_manager,
                &self.ctx.txn,
                self.plan.table_oid,
            )?;

            if let Some(rid) = new_rid {
                update_count += 1;
                for index_info in &indexes {
                    let new_key = new_tuple
                        .key_from_tuple(&index_info.key_schema, index_info.index.key_attrs())?;
                    index_info.index.insert_entry(&new_key, rid, &self.ctx.txn)?;
                }
            }
        }
        debug!("updated {update_count} rows in '{}'", table_info.name);

        self.done = true;
        let count = Tuple::new(
            self.plan.output_schema.clone(),
            vec![Value::Integer(update_count)],
        );
        Ok(Some((count, RecordId::invalid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
