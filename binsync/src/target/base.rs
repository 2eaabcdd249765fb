use std::future::Future;

use crate::error::SyncResult;
use crate::types::{Block, TargetTableSchema};

/// Trait for the analytical store that receives the mirrored tables.
///
/// The store's SQL executor, storage engine and DDL dialect translation all
/// live behind this boundary. Implementations are expected to be cheap to
/// clone (handle semantics) and safe to call from the single sync worker
/// while other parts of the process query the store.
pub trait Target: Send + Sync {
    /// Guard type proving the per-database DDL lock is held.
    type DdlGuard: Send;

    /// Acquires the exclusive DDL lock for `database`.
    ///
    /// The snapshot dumper holds this for the whole table-drop step so that
    /// concurrent schema changes cannot interleave.
    fn lock_ddl(&self, database: &str) -> impl Future<Output = SyncResult<Self::DdlGuard>> + Send;

    /// Lists the tables currently present in `database`.
    fn table_names(&self, database: &str) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Drops `table` from `database`. Requires the DDL lock.
    fn drop_table(
        &self,
        guard: &Self::DdlGuard,
        database: &str,
        table: &str,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Forwards a DDL statement from the source through the store's dialect
    /// translator.
    ///
    /// `database` scopes the statement to a target database when the source
    /// statement applied to the mirrored schema; `None` leaves the
    /// statement in the default scope. A statement the translator cannot
    /// parse fails with [`crate::error::ErrorKind::DdlSyntaxError`].
    fn execute_source_ddl(
        &self,
        database: Option<&str>,
        source_ddl: &str,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the schema and sorting key of a materialized table.
    fn table_schema(
        &self,
        database: &str,
        table: &str,
    ) -> impl Future<Output = SyncResult<TargetTableSchema>> + Send;

    /// Appends a block to `table`.
    ///
    /// With `include_materialized` the block carries the sign/version
    /// trailer columns explicitly; otherwise it holds only the user columns
    /// and the store fills the trailer defaults (sign +1, version 0).
    fn insert_block(
        &self,
        database: &str,
        table: &str,
        block: Block,
        include_materialized: bool,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}
