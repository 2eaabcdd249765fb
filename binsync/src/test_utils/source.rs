//! A scripted source connection for prepare-phase tests.

use std::collections::BTreeMap;

use binsync_mysql::types::{BinlogPosition, Row, TableName};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::replication::source::SourceConnection;
use crate::sync_error;

/// A scripted source table: its captured DDL and current rows.
#[derive(Debug, Clone)]
pub struct ScriptedTable {
    pub ddl: String,
    pub rows: Vec<Row>,
}

/// Source connection replaying scripted introspection results.
///
/// Tracks transaction calls so tests can assert the snapshot protocol, and
/// can fail a configurable number of leading queries to exercise the
/// prepare retry loop.
#[derive(Debug)]
pub struct ScriptedSourceConnection {
    variables: Vec<(String, String)>,
    server_version: String,
    server_uuid: String,
    master_position: BinlogPosition,
    tables: BTreeMap<String, ScriptedTable>,
    connect_failures_remaining: u32,
    /// Snapshot protocol observations.
    pub begin_calls: usize,
    pub commit_calls: usize,
    pub rollback_calls: usize,
    snapshot_open: bool,
}

impl ScriptedSourceConnection {
    pub fn new() -> ScriptedSourceConnection {
        ScriptedSourceConnection {
            variables: Vec::new(),
            server_version: "8.0.35".to_string(),
            server_uuid: "3e11fa47-71ca-11e1-9e33-c80aa9429562".to_string(),
            master_position: BinlogPosition::new("binlog.000001", 4),
            tables: BTreeMap::new(),
            connect_failures_remaining: 0,
            begin_calls: 0,
            commit_calls: 0,
            rollback_calls: 0,
            snapshot_open: false,
        }
    }

    /// A source whose replication variables satisfy the preflight.
    pub fn replication_ready() -> ScriptedSourceConnection {
        Self::new().with_variables(vec![
            ("log_bin".to_string(), "ON".to_string()),
            ("binlog_format".to_string(), "ROW".to_string()),
            ("binlog_row_image".to_string(), "FULL".to_string()),
            (
                "default_authentication_plugin".to_string(),
                "mysql_native_password".to_string(),
            ),
        ])
    }

    pub fn with_variables(mut self, variables: Vec<(String, String)>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_server_version(mut self, version: &str) -> Self {
        self.server_version = version.to_string();
        self
    }

    pub fn with_server_uuid(mut self, uuid: &str) -> Self {
        self.server_uuid = uuid.to_string();
        self
    }

    pub fn with_master_position(mut self, position: BinlogPosition) -> Self {
        self.master_position = position;
        self
    }

    pub fn with_table(mut self, name: &str, ddl: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(
            name.to_string(),
            ScriptedTable {
                ddl: ddl.to_string(),
                rows,
            },
        );
        self
    }

    /// Fails the next `count` queries with a connection error.
    pub fn with_connect_failures(mut self, count: u32) -> Self {
        self.connect_failures_remaining = count;
        self
    }

    fn maybe_fail_connect(&mut self) -> SyncResult<()> {
        if self.connect_failures_remaining > 0 {
            self.connect_failures_remaining -= 1;
            bail!(
                ErrorKind::SourceConnectionFailed,
                "scripted connection failure"
            );
        }
        Ok(())
    }
}

impl Default for ScriptedSourceConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceConnection for ScriptedSourceConnection {
    async fn replication_variables(&mut self) -> SyncResult<Vec<(String, String)>> {
        self.maybe_fail_connect()?;
        Ok(self.variables.clone())
    }

    async fn server_version(&mut self) -> SyncResult<String> {
        Ok(self.server_version.clone())
    }

    async fn server_uuid(&mut self) -> SyncResult<String> {
        self.maybe_fail_connect()?;
        Ok(self.server_uuid.clone())
    }

    async fn begin_consistent_snapshot(&mut self) -> SyncResult<()> {
        self.begin_calls += 1;
        self.snapshot_open = true;
        Ok(())
    }

    async fn master_status(&mut self) -> SyncResult<BinlogPosition> {
        Ok(self.master_position.clone())
    }

    async fn list_tables(&mut self, _database: &str) -> SyncResult<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn table_ddl(&mut self, table: &TableName) -> SyncResult<String> {
        self.tables
            .get(&table.name)
            .map(|table| table.ddl.clone())
            .ok_or_else(|| {
                sync_error!(
                    ErrorKind::QueryExecutionFailed,
                    "scripted source has no such table",
                    table.to_string()
                )
            })
    }

    async fn stream_table_rows(
        &mut self,
        table: &TableName,
    ) -> SyncResult<BoxStream<'_, SyncResult<Row>>> {
        if !self.snapshot_open {
            bail!(
                ErrorKind::InvalidState,
                "table scans require an open consistent-snapshot transaction"
            );
        }

        let rows = self
            .tables
            .get(&table.name)
            .map(|table| table.rows.clone())
            .ok_or_else(|| {
                sync_error!(
                    ErrorKind::QueryExecutionFailed,
                    "scripted source has no such table",
                    table.to_string()
                )
            })?;

        Ok(futures::stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn commit_snapshot(&mut self) -> SyncResult<()> {
        self.commit_calls += 1;
        self.snapshot_open = false;
        Ok(())
    }

    async fn rollback_snapshot(&mut self) -> SyncResult<()> {
        self.rollback_calls += 1;
        self.snapshot_open = false;
        Ok(())
    }
}
