//! Store adapter layer
//!
//! The tree engine never talks to a database directly. It issues typed
//! statements through the [`Store`] trait:
//! - `select` / `insert` / `update` / `delete` over one table
//! - table-level write locks bracketing every mutation
//! - literal escaping for backends that render SQL text
//!
//! [`MemoryStore`] is the bundled backend; SQL drivers render the same
//! statements through [`Statement`].

mod memory;
mod snapshot;
mod statement;

pub use memory::{ConnectionId, MemoryStore};
pub use statement::{escape_literal, Statement};

use crate::types::{NodeId, SqlRow, Value};
use crate::{MpttError, Result};
use std::cmp::Ordering;

/// Comparison operator of a WHERE condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }
}

/// `column <op> value`; a statement's conditions are joined by AND
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Ge, value)
    }

    /// Evaluate against a row. Missing columns and mismatched types never match.
    pub fn matches(&self, row: &SqlRow) -> bool {
        row.get(&self.column)
            .and_then(|v| v.partial_cmp(&self.value))
            .is_some_and(|ord| self.op.accepts(ord))
    }
}

/// Right-hand side of a `SET column = ...` clause
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// `column = value`
    Value(Value),
    /// `column = column + delta`
    Add(i64),
    /// `column = column * -1`; parks a boundary outside every positive range
    Negate,
    /// `column = (column - shift) * -1`; un-parks and shifts in one step
    Unpark(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub expr: SetExpr,
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            expr: SetExpr::Value(value.into()),
        }
    }

    pub fn add(column: impl Into<String>, delta: i64) -> Self {
        Self {
            column: column.into(),
            expr: SetExpr::Add(delta),
        }
    }

    pub fn negate(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expr: SetExpr::Negate,
        }
    }

    pub fn unpark(column: impl Into<String>, shift: i64) -> Self {
        Self {
            column: column.into(),
            expr: SetExpr::Unpark(shift),
        }
    }

    /// Compute the new value from the column's current value
    pub fn evaluate(&self, current: &Value) -> Result<Value> {
        let int = || {
            current.as_i64().ok_or_else(|| {
                MpttError::Store(format!(
                    "arithmetic on non-integer column '{}' ({:?})",
                    self.column, current
                ))
            })
        };

        Ok(match &self.expr {
            SetExpr::Value(v) => v.clone(),
            SetExpr::Add(delta) => Value::Integer(int()? + delta),
            SetExpr::Negate => Value::Integer(-int()?),
            SetExpr::Unpark(shift) => Value::Integer(-(int()? - shift)),
        })
    }
}

/// Forward-only cursor over selected rows
#[derive(Debug, Default)]
pub struct RowCursor {
    rows: std::vec::IntoIter<SqlRow>,
}

impl RowCursor {
    pub fn new(rows: Vec<SqlRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Next row as a column-name map, `None` once exhausted
    pub fn fetch_assoc(&mut self) -> Option<SqlRow> {
        self.rows.next()
    }
}

impl Iterator for RowCursor {
    type Item = SqlRow;

    fn next(&mut self) -> Option<SqlRow> {
        self.fetch_assoc()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Capability set the tree engine consumes.
///
/// Every mutation the engine performs is bracketed by
/// `lock_table_for_write` / `unlock_all_tables`; reads take no lock.
pub trait Store {
    /// `SELECT columns FROM table WHERE conditions ORDER BY order_by`.
    /// An empty column list selects every column.
    fn select(
        &self,
        columns: &[&str],
        table: &str,
        conditions: &[Condition],
        order_by: &[&str],
    ) -> Result<RowCursor>;

    /// Insert one row; the id column is assigned by the store when omitted
    fn insert(&mut self, table: &str, columns: &[&str], values: Vec<Value>) -> Result<()>;

    /// Id assigned by this connection's most recent insert
    fn last_insert_id(&self) -> NodeId;

    /// Returns the number of affected rows
    fn update(&mut self, table: &str, sets: &[Assignment], conditions: &[Condition]) -> Result<usize>;

    /// Returns the number of deleted rows
    fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<usize>;

    fn lock_table_for_write(&mut self, table: &str) -> Result<()>;

    fn unlock_all_tables(&mut self) -> Result<()>;

    /// Sanitize a text literal for inclusion in a rendered statement
    fn escape(&self, raw: &str) -> String {
        escape_literal(raw)
    }

    fn is_connected(&self) -> bool;

    /// Description of the last failure, empty if none
    fn error_info(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> SqlRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_condition_matching() {
        let r = row(&[("lft", Value::Integer(5)), ("title", Value::from("Meat"))]);

        assert!(Condition::gt("lft", 4i64).matches(&r));
        assert!(!Condition::gt("lft", 5i64).matches(&r));
        assert!(Condition::ge("lft", 5i64).matches(&r));
        assert!(Condition::le("lft", 5i64).matches(&r));
        assert!(Condition::lt("lft", 6i64).matches(&r));
        assert!(Condition::eq("title", "Meat").matches(&r));

        // 类型不匹配或列不存在时永远不匹配
        assert!(!Condition::eq("lft", "5").matches(&r));
        assert!(!Condition::eq("rgt", 5i64).matches(&r));
    }

    #[test]
    fn test_assignment_park_roundtrip() {
        let park = Assignment::negate("lft");
        let parked = park.evaluate(&Value::Integer(7)).unwrap();
        assert_eq!(parked, Value::Integer(-7));

        // (-7 - 3) * -1 = 10 = 7 + 3
        let unpark = Assignment::unpark("lft", 3);
        assert_eq!(unpark.evaluate(&parked).unwrap(), Value::Integer(10));
    }

    #[test]
    fn test_assignment_rejects_text_arithmetic() {
        let add = Assignment::add("title", 2);
        assert!(add.evaluate(&Value::from("x")).is_err());
        assert_eq!(
            Assignment::set("title", "y").evaluate(&Value::from("x")).unwrap(),
            Value::from("y")
        );
    }

    #[test]
    fn test_row_cursor() {
        let mut cursor = RowCursor::new(vec![row(&[("id", Value::Integer(1))]), row(&[("id", Value::Integer(2))])]);
        assert_eq!(cursor.size_hint(), (2, Some(2)));
        assert_eq!(cursor.fetch_assoc().unwrap()["id"], Value::Integer(1));
        assert_eq!(cursor.next().unwrap()["id"], Value::Integer(2));
        assert!(cursor.next().is_none());
    }
}
