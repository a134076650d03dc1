use std::sync::Arc;

use kiln::buffer::BufferPoolManager;
use kiln::catalog::Catalog;
use kiln::execution::{
    count_schema, execute_to_vec, ExecutorContext, Expression, InsertPlanNode, PlanNode,
    SeqScanPlanNode, ValuesPlanNode,
};
use kiln::optimizer::optimize_seq_scan_as_index_scan;
use kiln::storage::disk::DiskManager;
use kiln::tuple::{Column, DataType, Schema, Value};
use kiln::txn::{LockManager, Transaction};

fn main() {
    env_logger::init();

    println!("Kiln - a disk-oriented relational engine core");
    println!("=============================================\n");

    let db_path = "kiln-demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
    let catalog = Arc::new(Catalog::new(bpm.clone()));

    let schema = Schema::new_arc(vec![
        Column::new("id", DataType::Integer),
        Column::new("name", DataType::Varchar(64)),
    ]);
    let table = catalog
        .create_table("people", schema.clone())
        .expect("failed to create table");
    catalog
        .create_index("people_id", "people", vec![0])
        .expect("failed to create index");

    let ctx = Arc::new(ExecutorContext::new(
        catalog.clone(),
        Arc::new(Transaction::new(1)),
        Arc::new(LockManager::new()),
        bpm,
    ));

    // INSERT INTO people VALUES (1, 'ada'), ..., (20, 'row-20')
    let rows: Vec<Vec<Value>> = (1..=20)
        .map(|i| vec![Value::Integer(i), Value::Varchar(format!("row-{i}"))])
        .collect();
    let insert_plan = PlanNode::Insert(InsertPlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        child: Box::new(PlanNode::Values(ValuesPlanNode {
            output_schema: schema.clone(),
            rows,
        })),
    });
    let inserted = execute_to_vec(ctx.clone(), &insert_plan).expect("insert failed");
    println!("inserted: {}", inserted[0].value(0).expect("count row"));

    // SELECT * FROM people WHERE id = 5 OR id = 9 OR id = 3
    let filter = Expression::or(
        Expression::or(
            Expression::equal(Expression::column(0), Expression::constant(5)),
            Expression::equal(Expression::column(0), Expression::constant(9)),
        ),
        Expression::equal(Expression::column(0), Expression::constant(3)),
    );
    let scan_plan = PlanNode::SeqScan(SeqScanPlanNode {
        output_schema: schema,
        table_oid: table.oid,
        filter: Some(filter),
    });

    let optimized = optimize_seq_scan_as_index_scan(scan_plan, &catalog);
    match &optimized {
        PlanNode::IndexScan(p) => println!(
            "\nplan: index scan with {} point keys (was: seq scan)",
            p.pred_keys.len()
        ),
        _ => println!("\nplan: seq scan (no rewrite)"),
    }

    let rows = execute_to_vec(ctx, &optimized).expect("query failed");
    println!("matching rows:");
    for row in rows {
        let values: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
        println!("  ({})", values.join(", "));
    }

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
