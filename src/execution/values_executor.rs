use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::executor::Executor;
use super::plan::ValuesPlanNode;

/// Emits each literal row of its plan once. Rows have no physical address.
pub struct ValuesExecutor {
    plan: ValuesPlanNode,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(plan: ValuesPlanNode) -> Self {
        Self { plan, cursor: 0 }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some(row) = self.plan.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let tuple = Tuple::new(self.plan.output_schema.clone(), row.clone());
        Ok(Some((tuple, RecordId::invalid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.plan.output_schema
    }
}
