//! In-memory target store for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::target::Target;
use crate::types::{Block, CellValue, TargetTableSchema, SIGN_EXISTS};

/// A DDL statement script entry: when a forwarded statement contains
/// `pattern`, the named table springs into existence with `schema`.
#[derive(Debug)]
struct DdlTableScript {
    pattern: String,
    table: String,
    schema: TargetTableSchema,
}

#[derive(Debug)]
struct MemoryTable {
    schema: TargetTableSchema,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Default, Debug)]
struct Inner {
    /// database -> table -> contents.
    databases: HashMap<String, HashMap<String, MemoryTable>>,
    /// Every statement forwarded through the DDL translator, with its scope.
    executed_ddl: Vec<(Option<String>, String)>,
    /// Scripted CREATE TABLE behavior, since no real translator is present.
    ddl_table_scripts: Vec<DdlTableScript>,
    /// Statement substrings the scripted translator rejects as syntax
    /// errors.
    ddl_syntax_error_patterns: Vec<String>,
    /// Tables whose inserts fail, to exercise flush error paths.
    failing_inserts: HashSet<String>,
}

/// In-memory analytical store for testing and development purposes.
///
/// [`MemoryTarget`] keeps every mirrored table as plain rows, including the
/// sign/version trailer, and implements merge-on-read so tests can assert
/// the logical state a real store would serve. DDL translation is scripted:
/// tests declare which statement creates which table.
#[derive(Clone, Debug)]
pub struct MemoryTarget {
    inner: Arc<Mutex<Inner>>,
    ddl_lock: Arc<Mutex<()>>,
}

impl MemoryTarget {
    /// Creates a new empty memory target.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            ddl_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Registers a table directly, bypassing DDL.
    pub async fn register_table(&self, database: &str, table: &str, schema: TargetTableSchema) {
        let mut inner = self.inner.lock().await;
        inner
            .databases
            .entry(database.to_string())
            .or_default()
            .insert(
                table.to_string(),
                MemoryTable {
                    schema,
                    rows: Vec::new(),
                },
            );
    }

    /// Scripts the DDL translator: a forwarded statement containing
    /// `pattern` creates `table` with `schema` in the scoped database.
    pub async fn script_ddl_table(&self, pattern: &str, table: &str, schema: TargetTableSchema) {
        let mut inner = self.inner.lock().await;
        inner.ddl_table_scripts.push(DdlTableScript {
            pattern: pattern.to_string(),
            table: table.to_string(),
            schema,
        });
    }

    /// Scripts the DDL translator to reject statements containing
    /// `pattern` as syntax errors.
    pub async fn script_ddl_syntax_error(&self, pattern: &str) {
        let mut inner = self.inner.lock().await;
        inner.ddl_syntax_error_patterns.push(pattern.to_string());
    }

    /// Makes every insert into `table` fail.
    pub async fn fail_inserts(&self, table: &str) {
        let mut inner = self.inner.lock().await;
        inner.failing_inserts.insert(table.to_string());
    }

    /// Every DDL statement forwarded so far, with its database scope.
    pub async fn executed_ddl(&self) -> Vec<(Option<String>, String)> {
        self.inner.lock().await.executed_ddl.clone()
    }

    /// The physical rows of a table, trailer columns included.
    pub async fn physical_rows(&self, database: &str, table: &str) -> Vec<Vec<CellValue>> {
        let inner = self.inner.lock().await;
        inner
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// The logical rows of a table after merge-on-read.
    ///
    /// Rows are grouped by sorting key; per key the row with the highest
    /// version wins and survives only if its sign is positive. The trailer
    /// columns are stripped from the result.
    pub async fn merged_rows(&self, database: &str, table: &str) -> Vec<Vec<CellValue>> {
        let inner = self.inner.lock().await;
        let Some(table) = inner
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
        else {
            return Vec::new();
        };

        let Ok(key_indices) = table.schema.sorting_key_indices() else {
            return Vec::new();
        };

        // (key, sign, version, user columns) per winning row, in first-seen
        // key order.
        let mut winners: Vec<(Vec<CellValue>, i8, u64, Vec<CellValue>)> = Vec::new();

        for row in &table.rows {
            let (sign, version) = match &row[row.len() - 2..] {
                [CellValue::I8(sign), CellValue::U64(version)] => (*sign, *version),
                _ => continue,
            };
            let key: Vec<CellValue> = key_indices
                .iter()
                .map(|&index| row[index].clone())
                .collect();
            let user_row = row[..row.len() - 2].to_vec();

            match winners.iter_mut().find(|(existing, ..)| *existing == key) {
                Some(winner) => {
                    if version >= winner.2 {
                        winner.1 = sign;
                        winner.2 = version;
                        winner.3 = user_row;
                    }
                }
                None => winners.push((key, sign, version, user_row)),
            }
        }

        winners
            .into_iter()
            .filter(|(_, sign, ..)| *sign == SIGN_EXISTS)
            .map(|(.., user_row)| user_row)
            .collect()
    }
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for MemoryTarget {
    type DdlGuard = OwnedMutexGuard<()>;

    async fn lock_ddl(&self, _database: &str) -> SyncResult<Self::DdlGuard> {
        Ok(self.ddl_lock.clone().lock_owned().await)
    }

    async fn table_names(&self, database: &str) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut names: Vec<String> = inner
            .databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn drop_table(
        &self,
        _guard: &Self::DdlGuard,
        database: &str,
        table: &str,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(tables) = inner.databases.get_mut(database) {
            tables.remove(table);
        }

        info!(database, table, "dropped table");
        Ok(())
    }

    async fn execute_source_ddl(&self, database: Option<&str>, source_ddl: &str) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .executed_ddl
            .push((database.map(str::to_string), source_ddl.to_string()));

        if inner
            .ddl_syntax_error_patterns
            .iter()
            .any(|pattern| source_ddl.contains(pattern.as_str()))
        {
            return Err(sync_error!(
                ErrorKind::DdlSyntaxError,
                "translator failed to parse forwarded statement",
                source_ddl
            ));
        }

        if let Some(database) = database {
            let script = inner
                .ddl_table_scripts
                .iter()
                .find(|script| source_ddl.contains(script.pattern.as_str()));
            if let Some(script) = script {
                let table = MemoryTable {
                    schema: script.schema.clone(),
                    rows: Vec::new(),
                };
                let (table_name, database) = (script.table.clone(), database.to_string());
                inner
                    .databases
                    .entry(database)
                    .or_default()
                    .insert(table_name, table);
            }
        }

        Ok(())
    }

    async fn table_schema(&self, database: &str, table: &str) -> SyncResult<TargetTableSchema> {
        let inner = self.inner.lock().await;
        inner
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .map(|table| table.schema.clone())
            .ok_or_else(|| {
                sync_error!(
                    ErrorKind::TableNotFound,
                    "table is not materialized in the target store",
                    format!("{database}.{table}")
                )
            })
    }

    async fn insert_block(
        &self,
        database: &str,
        table: &str,
        block: Block,
        include_materialized: bool,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.failing_inserts.contains(table) {
            return Err(sync_error!(
                ErrorKind::TargetWriteFailed,
                "insert into target table failed",
                format!("{database}.{table}")
            ));
        }

        let Some(stored) = inner
            .databases
            .get_mut(database)
            .and_then(|tables| tables.get_mut(table))
        else {
            return Err(sync_error!(
                ErrorKind::TableNotFound,
                "table is not materialized in the target store",
                format!("{database}.{table}")
            ));
        };

        let expected_columns = if include_materialized {
            stored.schema.columns.len()
        } else {
            stored.schema.ordinary_columns().len()
        };
        if block.columns().len() != expected_columns {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "block layout does not match the target table",
                format!(
                    "{} columns for {database}.{table}, expected {expected_columns}",
                    block.columns().len()
                )
            ));
        }

        info!(
            database,
            table,
            rows = block.rows(),
            include_materialized,
            "writing block"
        );

        for row in 0..block.rows() {
            let mut values = block.row_values(row);
            if !include_materialized {
                values.push(CellValue::I8(SIGN_EXISTS));
                values.push(CellValue::U64(0));
            }
            stored.rows.push(values);
        }

        Ok(())
    }
}
