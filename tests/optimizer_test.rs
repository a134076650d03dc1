//! Integration tests for the seq-scan to index-scan rewrite.

use std::sync::Arc;

use kiln::buffer::BufferPoolManager;
use kiln::catalog::Catalog;
use kiln::common::TableOid;
use kiln::execution::{
    count_schema, execute_to_vec, ComparisonType, ExecutorContext, Expression, InsertPlanNode,
    PlanNode, SeqScanPlanNode, ValuesPlanNode,
};
use kiln::optimizer::optimize_seq_scan_as_index_scan;
use kiln::storage::disk::DiskManager;
use kiln::tuple::{Column, DataType, Schema, Value};
use kiln::txn::{LockManager, Transaction};

use tempfile::NamedTempFile;

struct Fixture {
    ctx: Arc<ExecutorContext>,
    catalog: Arc<Catalog>,
    schema: Arc<Schema>,
    table_oid: TableOid,
    index_oid: u32,
    _temp: NamedTempFile,
}

/// `t(id INTEGER, score INTEGER)` with an index on `id`, loaded with
/// twenty rows `(i, i * 10)`.
fn fixture() -> Fixture {
    let temp = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(128, 2, disk_manager));
    let catalog = Arc::new(Catalog::new(bpm.clone()));

    let schema = Schema::new_arc(vec![
        Column::new("id", DataType::Integer),
        Column::new("score", DataType::Integer),
    ]);
    let table = catalog.create_table("t", schema.clone()).unwrap();
    let index = catalog.create_index("t_id", "t", vec![0]).unwrap();

    let ctx = Arc::new(ExecutorContext::new(
        catalog.clone(),
        Arc::new(Transaction::new(1)),
        Arc::new(LockManager::new()),
        bpm,
    ));

    let rows: Vec<Vec<Value>> = (0..20)
        .map(|i| vec![Value::Integer(i), Value::Integer(i * 10)])
        .collect();
    let insert = PlanNode::Insert(InsertPlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        child: Box::new(PlanNode::Values(ValuesPlanNode {
            output_schema: schema.clone(),
            rows,
        })),
    });
    execute_to_vec(ctx.clone(), &insert).unwrap();

    Fixture {
        ctx,
        catalog,
        schema,
        table_oid: table.oid,
        index_oid: index.oid,
        _temp: temp,
    }
}

fn seq_scan(fixture: &Fixture, filter: Arc<Expression>) -> PlanNode {
    PlanNode::SeqScan(SeqScanPlanNode {
        output_schema: fixture.schema.clone(),
        table_oid: fixture.table_oid,
        filter: Some(filter),
    })
}

fn ids_of(rows: &[kiln::tuple::Tuple]) -> Vec<i32> {
    let mut ids: Vec<i32> = rows
        .iter()
        .map(|t| match t.value(0).unwrap() {
            Value::Integer(v) => *v,
            other => panic!("unexpected id {other}"),
        })
        .collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_or_filter_rewrites_to_point_scan() {
    let fixture = fixture();

    // WHERE id = 5 OR id = 9 OR id = 3
    let filter = Expression::or(
        Expression::or(
            Expression::equal(Expression::column(0), Expression::constant(5)),
            Expression::equal(Expression::column(0), Expression::constant(9)),
        ),
        Expression::equal(Expression::column(0), Expression::constant(3)),
    );
    let plan = seq_scan(&fixture, filter);
    let optimized = optimize_seq_scan_as_index_scan(plan.clone(), &fixture.catalog);

    let PlanNode::IndexScan(index_scan) = &optimized else {
        panic!("expected an index scan after optimization");
    };
    assert_eq!(index_scan.index_oid, fixture.index_oid);
    assert_eq!(index_scan.pred_keys.len(), 3);
    assert!(index_scan.filter.is_some(), "filter kept for post-filtering");

    // Both plans return the same rows, with no duplicates.
    let original_rows = execute_to_vec(fixture.ctx.clone(), &plan).unwrap();
    let optimized_rows = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(ids_of(&original_rows), vec![3, 5, 9]);
    assert_eq!(ids_of(&optimized_rows), vec![3, 5, 9]);
}

#[test]
fn test_flipped_equality_rewrites() {
    let fixture = fixture();

    // WHERE 5 = id
    let filter = Expression::equal(Expression::constant(5), Expression::column(0));
    let optimized = optimize_seq_scan_as_index_scan(seq_scan(&fixture, filter), &fixture.catalog);
    assert!(matches!(optimized, PlanNode::IndexScan(_)));

    let rows = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(ids_of(&rows), vec![5]);
}

#[test]
fn test_non_indexed_column_keeps_seq_scan() {
    let fixture = fixture();

    // WHERE score = 50: no index leads with column 1.
    let filter = Expression::equal(Expression::column(1), Expression::constant(50));
    let optimized =
        optimize_seq_scan_as_index_scan(seq_scan(&fixture, filter.clone()), &fixture.catalog);
    assert!(matches!(optimized, PlanNode::SeqScan(_)));

    let rows = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(ids_of(&rows), vec![5]);
}

#[test]
fn test_mixed_or_keeps_seq_scan() {
    let fixture = fixture();

    // WHERE id = 5 OR score = 90: different columns, not extractable.
    let filter = Expression::or(
        Expression::equal(Expression::column(0), Expression::constant(5)),
        Expression::equal(Expression::column(1), Expression::constant(90)),
    );
    let optimized = optimize_seq_scan_as_index_scan(seq_scan(&fixture, filter), &fixture.catalog);
    assert!(matches!(optimized, PlanNode::SeqScan(_)));

    let rows = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(ids_of(&rows), vec![5, 9]);
}

#[test]
fn test_range_filter_keeps_seq_scan() {
    let fixture = fixture();

    // WHERE id < 4 is not a point predicate.
    let filter = Expression::comparison(
        ComparisonType::LessThan,
        Expression::column(0),
        Expression::constant(4),
    );
    let optimized = optimize_seq_scan_as_index_scan(seq_scan(&fixture, filter), &fixture.catalog);
    assert!(matches!(optimized, PlanNode::SeqScan(_)));

    let rows = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(ids_of(&rows), vec![0, 1, 2, 3]);
}

#[test]
fn test_rewrite_reaches_through_mutators() {
    let fixture = fixture();

    // DELETE FROM t WHERE id = 5 OR id = 9: the child scan is rewritten.
    let filter = Expression::or(
        Expression::equal(Expression::column(0), Expression::constant(5)),
        Expression::equal(Expression::column(0), Expression::constant(9)),
    );
    let plan = PlanNode::Delete(kiln::execution::DeletePlanNode {
        output_schema: count_schema(),
        table_oid: fixture.table_oid,
        child: Box::new(seq_scan(&fixture, filter)),
    });
    let optimized = optimize_seq_scan_as_index_scan(plan, &fixture.catalog);

    let PlanNode::Delete(delete) = &optimized else {
        panic!("delete node must survive");
    };
    assert!(matches!(delete.child.as_ref(), PlanNode::IndexScan(_)));

    let result = execute_to_vec(fixture.ctx.clone(), &optimized).unwrap();
    assert_eq!(result[0].value(0), Some(&Value::Integer(2)));
}
