//! In-memory relational backend
//!
//! Tables live behind one shared `RwLock`, so several connections (one per
//! tree session) can work on the same data. Each connection keeps its own
//! `last_insert_id` and may own the table write lock; while it does, writes
//! from every other connection fail fast with `MpttError::Lock`.

use super::snapshot;
use super::{Assignment, Condition, RowCursor, Statement, Store};
use crate::config::MpttConfig;
use crate::types::{NodeId, SqlRow, Value};
use crate::{MpttError, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Identifies one connection to a `MemoryStore`
pub type ConnectionId = u64;

/// One table: declared columns plus rows in insertion order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MemTable {
    pub id_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<SqlRow>,
    /// Next auto-increment id
    pub next_id: NodeId,
}

impl MemTable {
    pub fn new(id_column: &str, columns: &[&str]) -> Self {
        let mut cols: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        if !cols.iter().any(|c| c == id_column) {
            cols.insert(0, id_column.to_string());
        }

        Self {
            id_column: id_column.to_string(),
            columns: cols,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn check_column(&self, table: &str, column: &str) -> Result<()> {
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(MpttError::Store(format!(
                "unknown column '{}' in table '{}'",
                column, table
            )))
        }
    }
}

#[derive(Debug)]
struct TableLock {
    table: String,
    owner: ConnectionId,
}

#[derive(Debug, Default)]
struct Shared {
    tables: HashMap<String, MemTable>,
    lock: Option<TableLock>,
    next_connection: ConnectionId,
}

impl Shared {
    fn table(&self, name: &str) -> Result<&MemTable> {
        self.tables
            .get(name)
            .ok_or_else(|| MpttError::Store(format!("table '{}' doesn't exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| MpttError::Store(format!("table '{}' doesn't exist", name)))
    }

    /// Writes are refused while another connection holds the table lock
    fn check_writable(&self, table: &str, connection: ConnectionId) -> Result<()> {
        match &self.lock {
            Some(lock) if lock.table == table && lock.owner != connection => Err(MpttError::Lock(format!(
                "table '{}' is locked for write by connection {}",
                table, lock.owner
            ))),
            _ => Ok(()),
        }
    }
}

/// In-memory store. Use [`MemoryStore::connect`] for further connections
/// to the same data.
///
/// ```
/// use mptt::{MemoryStore, MpttConfig, Store};
///
/// let config = MpttConfig::default();
/// let store = MemoryStore::new();
/// store.install(&config).unwrap();
///
/// let other = store.connect();
/// assert_ne!(store.connection_id(), other.connection_id());
/// assert_eq!(other.row_count("mptt").unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<RwLock<Shared>>,
    connection: ConnectionId,
    last_insert_id: NodeId,
    last_error: Mutex<Option<String>>,
    connected: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store and open its first connection
    pub fn new() -> Self {
        Self::from_shared(Arc::new(RwLock::new(Shared::default())))
    }

    fn from_shared(shared: Arc<RwLock<Shared>>) -> Self {
        let connection = {
            let mut guard = shared.write();
            guard.next_connection += 1;
            guard.next_connection
        };

        Self {
            shared,
            connection,
            last_insert_id: 0,
            last_error: Mutex::new(None),
            connected: true,
        }
    }

    /// Open another connection on the same tables
    pub fn connect(&self) -> Self {
        Self::from_shared(Arc::clone(&self.shared))
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Close this connection. Every later call fails; a held lock is released.
    pub fn disconnect(&mut self) {
        self.release_lock();
        self.connected = false;
    }

    /// Create a table. The id column is added if `columns` omits it.
    pub fn create_table(&self, name: &str, id_column: &str, columns: &[&str]) -> Result<()> {
        let mut shared = self.shared.write();
        if shared.tables.contains_key(name) {
            return Err(MpttError::Store(format!("table '{}' already exists", name)));
        }
        shared.tables.insert(name.to_string(), MemTable::new(id_column, columns));
        tracing::debug!(table = name, connection = self.connection, "created table");
        Ok(())
    }

    /// Create the tree table described by `config`
    pub fn install(&self, config: &MpttConfig) -> Result<()> {
        config.validate()?;
        self.create_table(&config.table, &config.id_column, &config.columns())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.shared.read().table(table)?.rows.len())
    }

    /// Owner of the current table write lock, if any
    pub fn lock_owner(&self) -> Option<ConnectionId> {
        self.shared.read().lock.as_ref().map(|l| l.owner)
    }

    /// Write every table to `path` (checksummed bincode)
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = {
            let shared = self.shared.read();
            snapshot::encode(&shared.tables)?
        };

        // 先写临时文件再 rename，避免半写入的快照
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    /// Open a new store from a snapshot written by `save_snapshot`
    pub fn open_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let tables = snapshot::decode(&bytes)?;

        tracing::debug!(path = %path.display(), tables = tables.len(), "opened snapshot");
        Ok(Self::from_shared(Arc::new(RwLock::new(Shared {
            tables,
            lock: None,
            next_connection: 0,
        }))))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(MpttError::Store(format!("connection {} is closed", self.connection)))
        }
    }

    fn release_lock(&self) {
        let mut shared = self.shared.write();
        if shared.lock.as_ref().is_some_and(|l| l.owner == self.connection) {
            shared.lock = None;
        }
    }

    /// Log the statement, run it, remember the error message on failure
    fn run<T>(&self, statement: Statement<'_>, f: impl FnOnce() -> Result<T>) -> Result<T> {
        tracing::trace!(connection = self.connection, sql = %statement.to_sql(|s| self.escape(s)), "execute");

        let result = self.ensure_connected().and_then(|_| f());
        if let Err(e) = &result {
            *self.last_error.lock() = Some(e.to_string());
        }
        result
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.release_lock();
    }
}

fn compare_rows(a: &SqlRow, b: &SqlRow, order_by: &[&str]) -> Ordering {
    for column in order_by {
        let ord = match (a.get(*column), b.get(*column)) {
            (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Store for MemoryStore {
    fn select(
        &self,
        columns: &[&str],
        table: &str,
        conditions: &[Condition],
        order_by: &[&str],
    ) -> Result<RowCursor> {
        let statement = Statement::Select { columns, table, conditions, order_by };
        self.run(statement, || {
            let shared = self.shared.read();
            let t = shared.table(table)?;
            for column in columns.iter().chain(order_by.iter()) {
                t.check_column(table, column)?;
            }
            for cond in conditions {
                t.check_column(table, &cond.column)?;
            }

            let mut rows: Vec<SqlRow> = t
                .rows
                .iter()
                .filter(|row| conditions.iter().all(|c| c.matches(row)))
                .cloned()
                .collect();

            if !order_by.is_empty() {
                rows.sort_by(|a, b| compare_rows(a, b, order_by));
            }

            if !columns.is_empty() {
                for row in rows.iter_mut() {
                    row.retain(|name, _| columns.contains(&name.as_str()));
                }
            }

            Ok(RowCursor::new(rows))
        })
    }

    fn insert(&mut self, table: &str, columns: &[&str], values: Vec<Value>) -> Result<()> {
        let statement = Statement::Insert { table, columns, values: &values };
        let connection = self.connection;
        let assigned = self.run(statement, || {
            if columns.len() != values.len() {
                return Err(MpttError::Store(format!(
                    "column count {} doesn't match value count {}",
                    columns.len(),
                    values.len()
                )));
            }

            let mut shared = self.shared.write();
            shared.check_writable(table, connection)?;
            let t = shared.table_mut(table)?;
            for column in columns {
                t.check_column(table, column)?;
            }

            let mut row: SqlRow = t.columns.iter().map(|c| (c.clone(), Value::Null)).collect();
            for (column, value) in columns.iter().zip(values.iter()) {
                row.insert(column.to_string(), value.clone());
            }

            // 自增 id：未显式给出时由表分配
            let explicit_id = row.get(&t.id_column).and_then(Value::as_i64);
            let id = match explicit_id {
                Some(explicit) if explicit > 0 => {
                    let explicit = explicit as NodeId;
                    let taken = t
                        .rows
                        .iter()
                        .any(|r| r.get(&t.id_column).and_then(Value::as_i64) == Some(explicit as i64));
                    if taken {
                        return Err(MpttError::Store(format!(
                            "duplicate entry {} for primary key '{}'",
                            explicit, t.id_column
                        )));
                    }
                    t.next_id = t.next_id.max(explicit + 1);
                    explicit
                }
                _ => {
                    let id = t.next_id;
                    t.next_id += 1;
                    row.insert(t.id_column.clone(), Value::from(id));
                    id
                }
            };

            t.rows.push(row);
            Ok(id)
        })?;

        self.last_insert_id = assigned;
        Ok(())
    }

    fn last_insert_id(&self) -> NodeId {
        self.last_insert_id
    }

    fn update(&mut self, table: &str, sets: &[Assignment], conditions: &[Condition]) -> Result<usize> {
        let statement = Statement::Update { table, sets, conditions };
        let connection = self.connection;
        self.run(statement, || {
            let mut shared = self.shared.write();
            shared.check_writable(table, connection)?;
            let t = shared.table_mut(table)?;
            for set in sets {
                t.check_column(table, &set.column)?;
            }
            for cond in conditions {
                t.check_column(table, &cond.column)?;
            }

            let mut affected = 0;
            for row in t.rows.iter_mut() {
                if !conditions.iter().all(|c| c.matches(row)) {
                    continue;
                }

                // 所有 SET 表达式都基于更新前的行求值
                let mut new_values = Vec::with_capacity(sets.len());
                for set in sets {
                    let current = row.get(&set.column).cloned().unwrap_or(Value::Null);
                    new_values.push((set.column.clone(), set.evaluate(&current)?));
                }
                for (column, value) in new_values {
                    row.insert(column, value);
                }
                affected += 1;
            }

            Ok(affected)
        })
    }

    fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<usize> {
        let statement = Statement::Delete { table, conditions };
        let connection = self.connection;
        self.run(statement, || {
            let mut shared = self.shared.write();
            shared.check_writable(table, connection)?;
            let t = shared.table_mut(table)?;
            for cond in conditions {
                t.check_column(table, &cond.column)?;
            }

            let before = t.rows.len();
            t.rows.retain(|row| !conditions.iter().all(|c| c.matches(row)));
            Ok(before - t.rows.len())
        })
    }

    fn lock_table_for_write(&mut self, table: &str) -> Result<()> {
        let connection = self.connection;
        self.run(Statement::LockTable { table }, || {
            let mut shared = self.shared.write();
            shared.table(table)?;

            if let Some(lock) = shared.lock.as_ref().filter(|l| l.owner != connection) {
                return Err(MpttError::Lock(format!(
                    "table '{}' is locked for write by connection {}",
                    lock.table, lock.owner
                )));
            }

            // LOCK TABLES 会隐式释放本连接已持有的锁
            shared.lock = Some(TableLock {
                table: table.to_string(),
                owner: connection,
            });
            Ok(())
        })
    }

    fn unlock_all_tables(&mut self) -> Result<()> {
        self.run(Statement::UnlockTables, || {
            self.release_lock();
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn error_info(&self) -> String {
        self.last_error.lock().clone().unwrap_or_default()
    }
}
