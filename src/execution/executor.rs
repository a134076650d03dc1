use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::context::ExecutorContext;
use super::delete_executor::DeleteExecutor;
use super::index_scan_executor::IndexScanExecutor;
use super::insert_executor::InsertExecutor;
use super::plan::PlanNode;
use super::seq_scan_executor::SeqScanExecutor;
use super::update_executor::UpdateExecutor;
use super::values_executor::ValuesExecutor;

/// Pull-based operator: `init` prepares cursors (and initializes children),
/// `next` produces one row at a time until it returns None.
pub trait Executor {
    fn init(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>>;

    fn output_schema(&self) -> &Arc<Schema>;
}

/// Builds the executor tree for a plan tree.
pub fn create_executor(ctx: Arc<ExecutorContext>, plan: &PlanNode) -> Box<dyn Executor> {
    match plan {
        PlanNode::Values(p) => Box::new(ValuesExecutor::new(p.clone())),
        PlanNode::SeqScan(p) => Box::new(SeqScanExecutor::new(ctx, p.clone())),
        PlanNode::IndexScan(p) => Box::new(IndexScanExecutor::new(ctx, p.clone())),
        PlanNode::Insert(p) => {
            let child = create_executor(ctx.clone(), &p.child);
            Box::new(InsertExecutor::new(ctx, p.clone(), child))
        }
        PlanNode::Delete(p) => {
            let child = create_executor(ctx.clone(), &p.child);
            Box::new(DeleteExecutor::new(ctx, p.clone(), child))
        }
        PlanNode::Update(p) => {
            let child = create_executor(ctx.clone(), &p.child);
            Box::new(UpdateExecutor::new(ctx, p.clone(), child))
        }
    }
}

/// Runs a plan to exhaustion, collecting every row.
pub fn execute_to_vec(ctx: Arc<ExecutorContext>, plan: &PlanNode) -> Result<Vec<Tuple>> {
    let mut executor = create_executor(ctx, plan);
    executor.init()?;
    let mut rows = Vec::new();
    while let Some((tuple, _rid)) = executor.next()? {
        rows.push(tuple);
    }
    Ok(rows)
}
