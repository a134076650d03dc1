use std::sync::Arc;

use crate::common::{IndexOid, TableOid};
use crate::tuple::{Column, DataType, Schema, Value};

use super::expression::Expression;

/// Physical plan tree. Tagged variants instead of a node class hierarchy;
/// the optimizer rebuilds nodes structurally.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Values(ValuesPlanNode),
    SeqScan(SeqScanPlanNode),
    IndexScan(IndexScanPlanNode),
    Insert(InsertPlanNode),
    Delete(DeletePlanNode),
    Update(UpdatePlanNode),
}

impl PlanNode {
    pub fn output_schema(&self) -> &Arc<Schema> {
        match self {
            PlanNode::Values(p) => &p.output_schema,
            PlanNode::SeqScan(p) => &p.output_schema,
            PlanNode::IndexScan(p) => &p.output_schema,
            PlanNode::Insert(p) => &p.output_schema,
            PlanNode::Delete(p) => &p.output_schema,
            PlanNode::Update(p) => &p.output_schema,
        }
    }
}

/// Literal rows (the child of an INSERT ... VALUES pipeline).
#[derive(Debug, Clone)]
pub struct ValuesPlanNode {
    pub output_schema: Arc<Schema>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct SeqScanPlanNode {
    pub output_schema: Arc<Schema>,
    pub table_oid: TableOid,
    pub filter: Option<Arc<Expression>>,
}

#[derive(Debug, Clone)]
pub struct IndexScanPlanNode {
    pub output_schema: Arc<Schema>,
    pub table_oid: TableOid,
    pub index_oid: IndexOid,
    /// Preserved for post-filtering after the index lookup.
    pub filter: Option<Arc<Expression>>,
    /// Point-lookup key expressions; empty means a full ordered scan.
    pub pred_keys: Vec<Arc<Expression>>,
}

#[derive(Debug, Clone)]
pub struct InsertPlanNode {
    pub output_schema: Arc<Schema>,
    pub table_oid: TableOid,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct DeletePlanNode {
    pub output_schema: Arc<Schema>,
    pub table_oid: TableOid,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct UpdatePlanNode {
    pub output_schema: Arc<Schema>,
    pub table_oid: TableOid,
    pub child: Box<PlanNode>,
    /// One expression per output column, evaluated against the old row.
    pub target_expressions: Vec<Arc<Expression>>,
}

/// Schema of the single count row the mutating operators emit.
pub fn count_schema() -> Arc<Schema> {
    Schema::new_arc(vec![Column::new("rows", DataType::Integer)])
}
