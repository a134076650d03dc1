use std::sync::Arc;

use log::debug;

use crate::catalog::Catalog;
use crate::execution::{Expression, IndexScanPlanNode, PlanNode};

/// Rewrites filtered sequential scans into point-lookup index scans.
///
/// Bottom-up over the plan tree: children first, then the node itself. A
/// SeqScan qualifies when its filter is an equality (or an OR of
/// equalities) between one column of the scanned tuple and constants, and
/// some index on the table leads with that column. The filter predicate is
/// kept on the rewritten node for post-filtering.
pub fn optimize_seq_scan_as_index_scan(plan: PlanNode, catalog: &Catalog) -> PlanNode {
    let plan = match plan {
        PlanNode::Insert(mut p) => {
            p.child = Box::new(optimize_seq_scan_as_index_scan(*p.child, catalog));
            PlanNode::Insert(p)
        }
        PlanNode::Delete(mut p) => {
            p.child = Box::new(optimize_seq_scan_as_index_scan(*p.child, catalog));
            PlanNode::Delete(p)
        }
        PlanNode::Update(mut p) => {
            p.child = Box::new(optimize_seq_scan_as_index_scan(*p.child, catalog));
            PlanNode::Update(p)
        }
        other => other,
    };

    match try_rewrite(&plan, catalog) {
        Some(rewritten) => rewritten,
        None => plan,
    }
}

fn try_rewrite(plan: &PlanNode, catalog: &Catalog) -> Option<PlanNode> {
    let PlanNode::SeqScan(seq_scan) = plan else {
        return None;
    };
    let filter = seq_scan.filter.as_ref()?;
    let (col_idx, pred_keys) = extract_or_keys(filter)?;

    let table_info = catalog.get_table(seq_scan.table_oid)?;
    for index_info in catalog.get_table_indexes(&table_info.name) {
        if index_info.index.key_attrs().first() == Some(&col_idx) {
            debug!(
                "rewriting seq scan of '{}' into index scan via '{}' ({} keys)",
                table_info.name,
                index_info.name,
                pred_keys.len()
            );
            return Some(PlanNode::IndexScan(IndexScanPlanNode {
                output_schema: seq_scan.output_schema.clone(),
                table_oid: seq_scan.table_oid,
                index_oid: index_info.oid,
                filter: Some(filter.clone()),
                pred_keys,
            }));
        }
    }
    None
}

/// Extracts `(column, key expressions)` from a predicate of the shape
/// `col = const`, `const = col`, or an OR tree of those over one column.
/// Any other shape yields None.
fn extract_or_keys(expr: &Expression) -> Option<(usize, Vec<Arc<Expression>>)> {
    use crate::execution::{ComparisonType, LogicType};

    match expr {
        Expression::Comparison(cmp) if cmp.comp_type == ComparisonType::Equal => {
            match (cmp.left.as_ref(), cmp.right.as_ref()) {
                (Expression::ColumnValue(col), Expression::Constant(_)) if col.tuple_idx == 0 => {
                    Some((col.col_idx, vec![cmp.right.clone()]))
                }
                (Expression::Constant(_), Expression::ColumnValue(col)) if col.tuple_idx == 0 => {
                    Some((col.col_idx, vec![cmp.left.clone()]))
                }
                _ => None,
            }
        }
        Expression::Logic(logic) if logic.logic_type == LogicType::Or => {
            let (left_col, mut left_keys) = extract_or_keys(&logic.left)?;
            let (right_col, right_keys) = extract_or_keys(&logic.right)?;
            if left_col != right_col {
                return None;
            }
            left_keys.extend(right_keys);
            Some((left_col, left_keys))
        }
        _ => None,
    }
}
