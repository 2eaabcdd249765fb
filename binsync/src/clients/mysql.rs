//! Source connection backed by a `mysql_async` connection pool.
//!
//! Plain lookups run on pooled connections. Once a consistent-snapshot
//! transaction is opened, a dedicated connection is pinned and every
//! subsequent query, including the streaming table scans of the dumper, runs
//! on it so that all reads observe the snapshot.

use binsync_config::shared::MySqlConnectionConfig;
use binsync_mysql::replication::db::connect_to_source_database;
use binsync_mysql::types::{BinlogPosition, FieldValue, Row, TableName};
use futures::stream::BoxStream;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Pool};
use tracing::debug;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::replication::source::SourceConnection;
use crate::{bail, sync_error};

/// The filtered variable query of the replication preflight. Only rows whose
/// name and value both match come back, so a fully configured source returns
/// exactly one row per requirement.
const REPLICATION_VARIABLES_QUERY: &str = "SHOW VARIABLES WHERE \
     (Variable_name = 'log_bin' AND upper(Value) = 'ON') \
     OR (Variable_name = 'binlog_format' AND upper(Value) = 'ROW') \
     OR (Variable_name = 'binlog_row_image' AND upper(Value) = 'FULL') \
     OR (Variable_name = 'default_authentication_plugin' AND upper(Value) = 'MYSQL_NATIVE_PASSWORD')";

/// A query connection to the source MySQL server.
pub struct MySqlSourceConnection {
    pool: Pool,
    /// Pinned connection holding the open consistent-snapshot transaction.
    snapshot: Option<Conn>,
}

impl MySqlSourceConnection {
    /// Creates a connection over an existing pool.
    pub fn new(pool: Pool) -> MySqlSourceConnection {
        MySqlSourceConnection {
            pool,
            snapshot: None,
        }
    }

    /// Creates a connection pool from the source configuration.
    ///
    /// Connects lazily; the first query performs the handshake.
    pub fn connect(config: &MySqlConnectionConfig) -> MySqlSourceConnection {
        Self::new(connect_to_source_database(config))
    }

    async fn query_rows(&mut self, query: &str) -> SyncResult<Vec<mysql_async::Row>> {
        match &mut self.snapshot {
            Some(conn) => conn.query(query).await.map_err(map_source_error),
            None => {
                let mut conn = self.pool.get_conn().await.map_err(map_source_error)?;
                conn.query(query).await.map_err(map_source_error)
            }
        }
    }

    fn string_at(row: &mysql_async::Row, index: usize, what: &'static str) -> SyncResult<String> {
        row.get_opt::<String, usize>(index)
            .and_then(Result::ok)
            .ok_or_else(|| {
                sync_error!(ErrorKind::QueryExecutionFailed, "malformed result row", what)
            })
    }
}

impl SourceConnection for MySqlSourceConnection {
    async fn replication_variables(&mut self) -> SyncResult<Vec<(String, String)>> {
        let rows = self
            .query_rows(REPLICATION_VARIABLES_QUERY)
            .await
            .map_err(map_preflight_error)?;

        rows.iter()
            .map(|row| {
                Ok((
                    Self::string_at(row, 0, "variable name")?,
                    Self::string_at(row, 1, "variable value")?,
                ))
            })
            .collect::<SyncResult<Vec<_>>>()
            .map_err(map_preflight_error)
    }

    async fn server_version(&mut self) -> SyncResult<String> {
        let rows = self
            .query_rows("SELECT version()")
            .await
            .map_err(map_preflight_error)?;
        let row = rows.first().ok_or_else(|| {
            sync_error!(
                ErrorKind::SourceConnectionFailed,
                "source did not report a server version"
            )
        })?;
        Self::string_at(row, 0, "server version").map_err(map_preflight_error)
    }

    async fn server_uuid(&mut self) -> SyncResult<String> {
        let rows = self.query_rows("SELECT @@server_uuid").await?;
        let row = rows.first().ok_or_else(|| {
            sync_error!(
                ErrorKind::QueryExecutionFailed,
                "source did not report a server uuid"
            )
        })?;
        Self::string_at(row, 0, "server uuid")
    }

    async fn begin_consistent_snapshot(&mut self) -> SyncResult<()> {
        if self.snapshot.is_some() {
            bail!(
                ErrorKind::InvalidState,
                "a consistent-snapshot transaction is already open"
            );
        }

        let mut conn = self.pool.get_conn().await.map_err(map_source_error)?;
        conn.query_drop("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .await
            .map_err(map_source_error)?;
        conn.query_drop("START TRANSACTION WITH CONSISTENT SNAPSHOT")
            .await
            .map_err(map_source_error)?;

        debug!("opened consistent-snapshot transaction");
        self.snapshot = Some(conn);
        Ok(())
    }

    async fn master_status(&mut self) -> SyncResult<BinlogPosition> {
        let rows = self.query_rows("SHOW MASTER STATUS").await?;
        let Some(row) = rows.first() else {
            bail!(
                ErrorKind::IllegalSourceConfig,
                "SHOW MASTER STATUS returned no rows; binary logging is disabled on the source"
            );
        };

        let file = Self::string_at(row, 0, "binlog file")?;
        let offset = row
            .get_opt::<u64, usize>(1)
            .and_then(Result::ok)
            .ok_or_else(|| {
                sync_error!(
                    ErrorKind::QueryExecutionFailed,
                    "malformed result row",
                    "binlog offset"
                )
            })?;

        Ok(BinlogPosition::new(file, offset))
    }

    async fn list_tables(&mut self, database: &str) -> SyncResult<Vec<String>> {
        let query = format!(
            "SHOW FULL TABLES FROM `{}` WHERE Table_type = 'BASE TABLE'",
            database.replace('`', "``")
        );
        let rows = self.query_rows(&query).await?;

        rows.iter()
            .map(|row| Self::string_at(row, 0, "table name"))
            .collect()
    }

    async fn table_ddl(&mut self, table: &TableName) -> SyncResult<String> {
        let query = format!("SHOW CREATE TABLE {}", table.as_quoted_identifier());
        let rows = self.query_rows(&query).await?;
        let row = rows.first().ok_or_else(|| {
            sync_error!(
                ErrorKind::QueryExecutionFailed,
                "SHOW CREATE TABLE returned no rows",
                table.to_string()
            )
        })?;
        Self::string_at(row, 1, "create table statement")
    }

    async fn stream_table_rows(
        &mut self,
        table: &TableName,
    ) -> SyncResult<BoxStream<'_, SyncResult<Row>>> {
        let Some(conn) = self.snapshot.as_mut() else {
            bail!(
                ErrorKind::InvalidState,
                "table scans require an open consistent-snapshot transaction"
            );
        };

        let query = format!("SELECT * FROM {}", table.as_quoted_identifier());
        let result = conn.query_iter(query).await.map_err(map_source_error)?;

        let stream = futures::stream::try_unfold(result, |mut result| async move {
            match result.next().await {
                Ok(Some(row)) => {
                    let fields: Row = row.unwrap().into_iter().map(FieldValue::from).collect();
                    Ok(Some((fields, result)))
                }
                Ok(None) => Ok(None),
                Err(error) => Err(map_source_error(error)),
            }
        });

        Ok(Box::pin(stream))
    }

    async fn commit_snapshot(&mut self) -> SyncResult<()> {
        let Some(mut conn) = self.snapshot.take() else {
            bail!(
                ErrorKind::InvalidState,
                "no consistent-snapshot transaction to commit"
            );
        };

        conn.query_drop("COMMIT").await.map_err(map_source_error)
    }

    async fn rollback_snapshot(&mut self) -> SyncResult<()> {
        let Some(mut conn) = self.snapshot.take() else {
            // Nothing to roll back; the failure handling paths call this
            // unconditionally.
            return Ok(());
        };

        conn.query_drop("ROLLBACK").await.map_err(map_source_error)
    }
}

/// Remaps preflight failures onto source unavailability.
///
/// The preflight queries run before replication can start; a rejected
/// statement (permissions, authentication) and an unreachable server mean
/// the same thing to the caller, so every failure lands on
/// [`ErrorKind::SourceConnectionFailed`].
fn map_preflight_error(error: SyncError) -> SyncError {
    if error.kind() == ErrorKind::SourceConnectionFailed {
        return error;
    }

    SyncError::with_source(
        ErrorKind::SourceConnectionFailed,
        "preflight query against the source failed",
        error,
    )
}

/// Classifies a driver error: transport-level failures are retryable
/// connection errors, everything else is a failed query.
fn map_source_error(error: mysql_async::Error) -> SyncError {
    match &error {
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => SyncError::with_source(
            ErrorKind::SourceConnectionFailed,
            "lost connection to the source server",
            error,
        ),
        _ => SyncError::with_source(
            ErrorKind::QueryExecutionFailed,
            "query against the source server failed",
            error,
        ),
    }
}
