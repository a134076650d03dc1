use std::sync::Arc;

use crate::common::{KilnError, Result};
use crate::tuple::{Schema, Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicType {
    And,
    Or,
}

/// A column reference: `tuple_idx` names which input row of the operator
/// the column comes from (0 for a scan's only input), `col_idx` the column
/// position within it.
#[derive(Debug, Clone)]
pub struct ColumnValueExpression {
    pub tuple_idx: usize,
    pub col_idx: usize,
}

#[derive(Debug, Clone)]
pub struct ConstantValueExpression {
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct ComparisonExpression {
    pub comp_type: ComparisonType,
    pub left: Arc<Expression>,
    pub right: Arc<Expression>,
}

#[derive(Debug, Clone)]
pub struct LogicExpression {
    pub logic_type: LogicType,
    pub left: Arc<Expression>,
    pub right: Arc<Expression>,
}

/// Expression tree over one input row. The optimizer pattern-matches the
/// comparison/logic/column/constant shapes; evaluation covers them all.
#[derive(Debug, Clone)]
pub enum Expression {
    ColumnValue(ColumnValueExpression),
    Constant(ConstantValueExpression),
    Comparison(ComparisonExpression),
    Logic(LogicExpression),
}

impl Expression {
    pub fn column(col_idx: usize) -> Arc<Self> {
        Arc::new(Expression::ColumnValue(ColumnValueExpression {
            tuple_idx: 0,
            col_idx,
        }))
    }

    pub fn constant(value: impl Into<Value>) -> Arc<Self> {
        Arc::new(Expression::Constant(ConstantValueExpression {
            value: value.into(),
        }))
    }

    pub fn comparison(
        comp_type: ComparisonType,
        left: Arc<Expression>,
        right: Arc<Expression>,
    ) -> Arc<Self> {
        Arc::new(Expression::Comparison(ComparisonExpression {
            comp_type,
            left,
            right,
        }))
    }

    pub fn equal(left: Arc<Expression>, right: Arc<Expression>) -> Arc<Self> {
        Self::comparison(ComparisonType::Equal, left, right)
    }

    pub fn logic(logic_type: LogicType, left: Arc<Expression>, right: Arc<Expression>) -> Arc<Self> {
        Arc::new(Expression::Logic(LogicExpression {
            logic_type,
            left,
            right,
        }))
    }

    pub fn or(left: Arc<Expression>, right: Arc<Expression>) -> Arc<Self> {
        Self::logic(LogicType::Or, left, right)
    }

    /// Evaluates against an input row. `tuple` may be None for expressions
    /// with no column references (how the index scan turns its key
    /// expressions into concrete keys).
    pub fn evaluate(&self, tuple: Option<&Tuple>, schema: &Schema) -> Result<Value> {
        match self {
            Expression::ColumnValue(col) => {
                let tuple = tuple.ok_or_else(|| {
                    KilnError::Expression("column reference evaluated without a row".to_string())
                })?;
                tuple.value(col.col_idx).cloned().ok_or_else(|| {
                    KilnError::Expression(format!("column {} out of range", col.col_idx))
                })
            }
            Expression::Constant(c) => Ok(c.value.clone()),
            Expression::Comparison(cmp) => {
                let left = cmp.left.evaluate(tuple, schema)?;
                let right = cmp.right.evaluate(tuple, schema)?;
                let ord = left.compare(&right).ok_or_else(|| {
                    KilnError::Expression(format!("cannot compare {left} with {right}"))
                })?;
                let result = match cmp.comp_type {
                    ComparisonType::Equal => ord.is_eq(),
                    ComparisonType::NotEqual => ord.is_ne(),
                    ComparisonType::LessThan => ord.is_lt(),
                    ComparisonType::LessThanOrEqual => ord.is_le(),
                    ComparisonType::GreaterThan => ord.is_gt(),
                    ComparisonType::GreaterThanOrEqual => ord.is_ge(),
                };
                Ok(Value::Boolean(result))
            }
            Expression::Logic(logic) => {
                let as_bool = |value: Value| {
                    value.as_bool().ok_or_else(|| {
                        KilnError::Expression(format!("expected a boolean, got {value}"))
                    })
                };
                let left = as_bool(logic.left.evaluate(tuple, schema)?)?;
                let right = as_bool(logic.right.evaluate(tuple, schema)?)?;
                let result = match logic.logic_type {
                    LogicType::And => left && right,
                    LogicType::Or => left || right,
                };
                Ok(Value::Boolean(result))
            }
        }
    }
}
