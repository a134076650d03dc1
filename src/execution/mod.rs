mod context;
mod delete_executor;
mod executor;
mod expression;
mod index_scan_executor;
mod insert_executor;
mod plan;
mod seq_scan_executor;
mod update_executor;
mod values_executor;

pub use context::ExecutorContext;
pub use delete_executor::DeleteExecutor;
pub use executor::{create_executor, execute_to_vec, Executor};
pub use expression::{
    ColumnValueExpression, ComparisonExpression, ComparisonType, ConstantValueExpression,
    Expression, LogicExpression, LogicType,
};
pub use index_scan_executor::IndexScanExecutor;
pub use insert_executor::InsertExecutor;
pub use plan::{
    count_schema, DeletePlanNode, IndexScanPlanNode, InsertPlanNode, PlanNode, SeqScanPlanNode,
    UpdatePlanNode, ValuesPlanNode,
};
pub use seq_scan_executor::SeqScanExecutor;
pub use update_executor::UpdateExecutor;
pub use values_executor::ValuesExecutor;
