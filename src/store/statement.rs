//! SQL rendering of store statements
//!
//! Produces MySQL-flavoured text for logging and for drivers that execute
//! plain SQL. Identifiers are assumed validated by `MpttConfig::validate`;
//! text literals go through the store's escape function.

use super::{Assignment, Condition, SetExpr};
use crate::types::Value;
use std::fmt::{self, Write};

/// Default literal escaping: backslashes and single quotes are doubled
pub fn escape_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "''")
}

/// One statement issued through the `Store` trait
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    Select {
        columns: &'a [&'a str],
        table: &'a str,
        conditions: &'a [Condition],
        order_by: &'a [&'a str],
    },
    Insert {
        table: &'a str,
        columns: &'a [&'a str],
        values: &'a [Value],
    },
    Update {
        table: &'a str,
        sets: &'a [Assignment],
        conditions: &'a [Condition],
    },
    Delete {
        table: &'a str,
        conditions: &'a [Condition],
    },
    LockTable {
        table: &'a str,
    },
    UnlockTables,
}

impl Statement<'_> {
    /// Render with a caller-supplied literal escape (usually `Store::escape`)
    pub fn to_sql<F: Fn(&str) -> String>(&self, escape: F) -> String {
        let mut sql = String::new();
        // 写入 String 不会失败
        let _ = self.write_sql(&mut sql, &escape);
        sql
    }

    fn write_sql<W: Write>(&self, out: &mut W, escape: &dyn Fn(&str) -> String) -> fmt::Result {
        match self {
            Statement::Select { columns, table, conditions, order_by } => {
                let select = if columns.is_empty() { "*".to_string() } else { columns.join(",") };
                write!(out, "SELECT {} FROM {}", select, table)?;
                write_where(out, conditions, escape)?;
                if !order_by.is_empty() {
                    write!(out, " ORDER BY {}", order_by.join(","))?;
                }
            }
            Statement::Insert { table, columns, values } => {
                write!(out, "INSERT INTO {} (`{}`) VALUES (", table, columns.join("`,`"))?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write_literal(out, value, escape)?;
                }
                out.write_char(')')?;
            }
            Statement::Update { table, sets, conditions } => {
                write!(out, "UPDATE {} SET ", table)?;
                for (i, set) in sets.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write_assignment(out, set, escape)?;
                }
                write_where(out, conditions, escape)?;
            }
            Statement::Delete { table, conditions } => {
                write!(out, "DELETE FROM {}", table)?;
                write_where(out, conditions, escape)?;
            }
            Statement::LockTable { table } => write!(out, "LOCK TABLE `{}` WRITE", table)?,
            Statement::UnlockTables => out.write_str("UNLOCK TABLES")?,
        }
        Ok(())
    }
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_sql(f, &escape_literal)
    }
}

fn write_literal<W: Write>(out: &mut W, value: &Value, escape: &dyn Fn(&str) -> String) -> fmt::Result {
    match value {
        Value::Integer(v) => write!(out, "{}", v),
        Value::Text(s) => write!(out, "'{}'", escape(s)),
        Value::Null => out.write_str("NULL"),
    }
}

fn write_where<W: Write>(out: &mut W, conditions: &[Condition], escape: &dyn Fn(&str) -> String) -> fmt::Result {
    for (i, cond) in conditions.iter().enumerate() {
        out.write_str(if i == 0 { " WHERE " } else { " AND " })?;
        write!(out, "{} {} ", cond.column, cond.op.symbol())?;
        write_literal(out, &cond.value, escape)?;
    }
    Ok(())
}

/// `col + 2`, `col - 2` rather than `col + -2`
fn signed(delta: i64) -> String {
    if delta < 0 {
        format!("- {}", delta.unsigned_abs())
    } else {
        format!("+ {}", delta)
    }
}

fn write_assignment<W: Write>(out: &mut W, set: &Assignment, escape: &dyn Fn(&str) -> String) -> fmt::Result {
    let col = &set.column;
    match &set.expr {
        SetExpr::Value(v) => {
            write!(out, "{} = ", col)?;
            write_literal(out, v, escape)
        }
        SetExpr::Add(delta) => write!(out, "{} = {} {}", col, col, signed(*delta)),
        SetExpr::Negate => write!(out, "{} = {} * -1", col, col),
        SetExpr::Unpark(shift) => write!(out, "{} = ({} {}) * -1", col, col, signed(-shift)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_select() {
        let conditions = [Condition::gt("lft", 1i64), Condition::lt("rgt", 10i64)];
        let stmt = Statement::Select {
            columns: &[],
            table: "mptt",
            conditions: &conditions,
            order_by: &["lft"],
        };
        assert_eq!(stmt.to_string(), "SELECT * FROM mptt WHERE lft > 1 AND rgt < 10 ORDER BY lft");

        let stmt = Statement::Select { columns: &["id", "title"], table: "mptt", conditions: &[], order_by: &[] };
        assert_eq!(stmt.to_string(), "SELECT id,title FROM mptt");
    }

    #[test]
    fn test_render_insert_escapes_text() {
        let values = [Value::from("O'Brien"), Value::Integer(3), Value::Null];
        let stmt = Statement::Insert { table: "mptt", columns: &["title", "lft", "parent"], values: &values };
        assert_eq!(
            stmt.to_string(),
            "INSERT INTO mptt (`title`,`lft`,`parent`) VALUES ('O''Brien', 3, NULL)"
        );

        // 自定义转义函数
        let custom = stmt.to_sql(|s| s.to_uppercase());
        assert!(custom.contains("'O'BRIEN'"));
    }

    #[test]
    fn test_render_boundary_shift_and_park() {
        let sets = [Assignment::add("lft", -4)];
        let conds = [Condition::gt("lft", 6i64)];
        let stmt = Statement::Update { table: "mptt", sets: &sets, conditions: &conds };
        assert_eq!(stmt.to_string(), "UPDATE mptt SET lft = lft - 4 WHERE lft > 6");

        let sets = [Assignment::negate("lft"), Assignment::negate("rgt")];
        let conds = [Condition::ge("lft", 2i64), Condition::le("rgt", 5i64)];
        let stmt = Statement::Update { table: "mptt", sets: &sets, conditions: &conds };
        assert_eq!(
            stmt.to_string(),
            "UPDATE mptt SET lft = lft * -1, rgt = rgt * -1 WHERE lft >= 2 AND rgt <= 5"
        );

        let sets = [Assignment::unpark("lft", 3)];
        let conds = [Condition::lt("lft", 0i64)];
        let stmt = Statement::Update { table: "mptt", sets: &sets, conditions: &conds };
        assert_eq!(stmt.to_string(), "UPDATE mptt SET lft = (lft - 3) * -1 WHERE lft < 0");

        let sets = [Assignment::unpark("lft", -3)];
        let stmt = Statement::Update { table: "mptt", sets: &sets, conditions: &[] };
        assert_eq!(stmt.to_string(), "UPDATE mptt SET lft = (lft + 3) * -1");
    }

    #[test]
    fn test_render_delete_and_locks() {
        let conds = [Condition::ge("lft", 2i64), Condition::le("rgt", 5i64)];
        let stmt = Statement::Delete { table: "mptt", conditions: &conds };
        assert_eq!(stmt.to_string(), "DELETE FROM mptt WHERE lft >= 2 AND rgt <= 5");
        assert_eq!(Statement::LockTable { table: "mptt" }.to_string(), "LOCK TABLE `mptt` WRITE");
        assert_eq!(Statement::UnlockTables.to_string(), "UNLOCK TABLES");
    }
}
