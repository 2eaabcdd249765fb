use std::future::Future;

use binsync_mysql::types::{BinlogPosition, Row, TableName};
use futures::stream::BoxStream;

use crate::error::SyncResult;

/// Trait for query connections to the source MySQL server.
///
/// The sync worker uses one source connection for preflight checks, for
/// capturing a consistent starting point, and for dumping existing table
/// contents. The binlog stream itself goes through
/// [`crate::replication::client::BinlogClient`].
///
/// A consistent-snapshot transaction, once opened, pins every subsequent
/// query (including table scans) to the snapshot until it is committed or
/// rolled back.
pub trait SourceConnection: Send {
    /// Returns the session/global variables relevant to the replication
    /// preflight, as `(name, value)` pairs.
    ///
    /// Any failure, transport loss and rejected queries alike, surfaces as
    /// [`crate::error::ErrorKind::SourceConnectionFailed`]: either way the
    /// source is unavailable for replication.
    fn replication_variables(
        &mut self,
    ) -> impl Future<Output = SyncResult<Vec<(String, String)>>> + Send;

    /// Returns the server version string, e.g. `8.0.35-log`.
    ///
    /// Part of the preflight; fails with
    /// [`crate::error::ErrorKind::SourceConnectionFailed`] like
    /// [`SourceConnection::replication_variables`].
    fn server_version(&mut self) -> impl Future<Output = SyncResult<String>> + Send;

    /// Returns the server's globally unique identity.
    fn server_uuid(&mut self) -> impl Future<Output = SyncResult<String>> + Send;

    /// Opens a transaction with a consistent snapshot.
    fn begin_consistent_snapshot(&mut self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the current binlog coordinates of the source.
    ///
    /// Inside a consistent-snapshot transaction this is the position the
    /// snapshot corresponds to.
    fn master_status(&mut self) -> impl Future<Output = SyncResult<BinlogPosition>> + Send;

    /// Lists the base tables of `database`.
    fn list_tables(
        &mut self,
        database: &str,
    ) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Returns the CREATE TABLE statement for `table`.
    fn table_ddl(&mut self, table: &TableName) -> impl Future<Output = SyncResult<String>> + Send;

    /// Streams every row of `table`.
    ///
    /// Must be called inside a consistent-snapshot transaction; the stream
    /// borrows the connection until it is dropped.
    fn stream_table_rows(
        &mut self,
        table: &TableName,
    ) -> impl Future<Output = SyncResult<BoxStream<'_, SyncResult<Row>>>> + Send;

    /// Commits the open consistent-snapshot transaction.
    fn commit_snapshot(&mut self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Rolls back the open consistent-snapshot transaction.
    fn rollback_snapshot(&mut self) -> impl Future<Output = SyncResult<()>> + Send;
}
