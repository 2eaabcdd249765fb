//! Bootstrap: capture a consistent starting point and dump existing tables.
//!
//! The prepare phase runs once per sync attempt. On a first run it opens a
//! consistent-snapshot transaction, records the binlog coordinates the
//! snapshot corresponds to, recreates every source table in the target and
//! streams the table contents across. The metadata commit wraps the whole
//! dump, so a crash anywhere before it leaves no trace except dropped
//! tables, which the next attempt recreates.

use std::time::{Duration, Instant};

use binsync_config::shared::SyncSettings;
use binsync_mysql::types::{Row, TableName};
use futures::StreamExt;
use rand::random;
use tracing::{info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::conversions::field::write_field_values;
use crate::error::{ErrorKind, SyncResult};
use crate::replication::client::BinlogClient;
use crate::replication::source::SourceConnection;
use crate::state::metadata::SyncMetadata;
use crate::state::store::{MetadataStore, StagedMetadata};
use crate::target::Target;
use crate::types::{Block, TargetColumnSchema};

/// Rows per block while streaming a table dump.
const DUMP_BLOCK_ROWS: usize = 8192;

/// Identifies the databases a prepare run operates on.
#[derive(Debug, Clone)]
pub struct PrepareContext {
    /// The source database being mirrored.
    pub source_database: String,
    /// The target database the mirror lives in.
    pub target_database: String,
}

/// Runs the prepare phase until it succeeds, the flag is cancelled, or a
/// non-retryable error occurs.
///
/// Connection-level failures back off for
/// `max_wait_time_when_source_unavailable` milliseconds and retry the whole
/// phase from scratch. Returns `Ok(None)` when cancelled.
pub async fn prepare_synchronized<S, C, T, M>(
    context: &PrepareContext,
    settings: &SyncSettings,
    source: &mut S,
    client: &mut C,
    target: &T,
    store: &M,
    shutdown_rx: &ShutdownRx,
) -> SyncResult<Option<SyncMetadata>>
where
    S: SourceConnection,
    C: BinlogClient,
    T: Target,
    M: MetadataStore,
{
    while !shutdown_rx.is_cancelled() {
        match prepare_attempt(context, source, client, target, store, shutdown_rx).await {
            Ok(outcome) => return Ok(outcome),
            Err(error) if error.kind() == ErrorKind::SourceConnectionFailed => {
                warn!(
                    error = %error,
                    backoff_ms = settings.max_wait_time_when_source_unavailable,
                    "source unavailable during prepare, backing off"
                );
                tokio::time::sleep(Duration::from_millis(
                    settings.max_wait_time_when_source_unavailable,
                ))
                .await;
            }
            Err(error) => return Err(error),
        }
    }

    Ok(None)
}

/// One prepare attempt: load or initialize metadata, dump if needed, start
/// the binlog stream.
async fn prepare_attempt<S, C, T, M>(
    context: &PrepareContext,
    source: &mut S,
    client: &mut C,
    target: &T,
    store: &M,
    shutdown_rx: &ShutdownRx,
) -> SyncResult<Option<SyncMetadata>>
where
    S: SourceConnection,
    C: BinlogClient,
    T: Target,
    M: MetadataStore,
{
    let (mut metadata, opened_transaction) =
        load_or_init_metadata(context, source, store).await?;

    if !metadata.need_dumping_tables.is_empty() {
        let staged = store.stage(&metadata).await?;

        match dump_tables(context, &metadata, source, target, shutdown_rx).await {
            Ok(true) => {
                staged.commit().await?;
                metadata.need_dumping_tables.clear();
            }
            Ok(false) => {
                staged.abort().await?;
                if opened_transaction {
                    source.rollback_snapshot().await?;
                }
                return Ok(None);
            }
            Err(error) => {
                if let Err(abort_error) = staged.abort().await {
                    warn!(error = %abort_error, "failed to abort staged metadata");
                }
                if opened_transaction
                    && let Err(rollback_error) = source.rollback_snapshot().await
                {
                    warn!(error = %rollback_error, "failed to roll back snapshot transaction");
                }
                return Err(error);
            }
        }
    }

    if opened_transaction {
        source.commit_snapshot().await?;
    }

    client.connect().await?;
    client
        .start_binlog_dump(random::<u32>(), &context.source_database, &metadata.position)
        .await?;

    info!(
        position = %metadata.position,
        version = metadata.version,
        "started binlog stream"
    );

    Ok(Some(metadata))
}

/// Loads the persisted metadata, or captures a fresh starting point under a
/// consistent snapshot when there is none.
///
/// A stored record belonging to a different server or source database is
/// discarded: its binlog coordinates are meaningless here, so the mirror is
/// rebuilt from scratch.
async fn load_or_init_metadata<S, M>(
    context: &PrepareContext,
    source: &mut S,
    store: &M,
) -> SyncResult<(SyncMetadata, bool)>
where
    S: SourceConnection,
    M: MetadataStore,
{
    let server_uuid = source.server_uuid().await?;

    if let Some(metadata) = store.load().await? {
        if metadata.source_server_uuid == server_uuid
            && metadata.source_database == context.source_database
        {
            info!(
                position = %metadata.position,
                version = metadata.version,
                tables = metadata.tables.len(),
                "resuming from persisted replication state"
            );
            return Ok((metadata, false));
        }

        warn!(
            stored_uuid = %metadata.source_server_uuid,
            server_uuid = %server_uuid,
            "source identity changed, discarding replication state and re-dumping"
        );
    }

    source.begin_consistent_snapshot().await?;

    match init_from_snapshot(context, source, server_uuid).await {
        Ok(metadata) => Ok((metadata, true)),
        Err(error) => {
            // Leave no transaction pinned behind, the retry loop will open a
            // fresh one.
            if let Err(rollback_error) = source.rollback_snapshot().await {
                warn!(error = %rollback_error, "failed to roll back snapshot transaction");
            }
            Err(error)
        }
    }
}

/// Captures the starting point inside the already-open snapshot
/// transaction.
async fn init_from_snapshot<S>(
    context: &PrepareContext,
    source: &mut S,
    server_uuid: String,
) -> SyncResult<SyncMetadata>
where
    S: SourceConnection,
{
    let position = source.master_status().await?;
    let tables = source.list_tables(&context.source_database).await?;

    let mut metadata = SyncMetadata::new(
        server_uuid,
        context.source_database.clone(),
        position.clone(),
        tables.clone(),
    );
    for table in &tables {
        let table_name = TableName::new(context.source_database.clone(), table.clone());
        let ddl = source.table_ddl(&table_name).await?;
        metadata.need_dumping_tables.insert(table.clone(), ddl);
    }

    info!(
        position = %position,
        tables = metadata.need_dumping_tables.len(),
        "captured consistent snapshot coordinates"
    );

    Ok(metadata)
}

/// Drops every table in the target database, recreates the dumped tables
/// through the DDL translator and streams their contents across.
///
/// Returns `Ok(false)` when cancelled at a block boundary.
async fn dump_tables<S, T>(
    context: &PrepareContext,
    metadata: &SyncMetadata,
    source: &mut S,
    target: &T,
    shutdown_rx: &ShutdownRx,
) -> SyncResult<bool>
where
    S: SourceConnection,
    T: Target,
{
    {
        let guard = target.lock_ddl(&context.target_database).await?;
        for table in target.table_names(&context.target_database).await? {
            target
                .drop_table(&guard, &context.target_database, &table)
                .await?;
        }
    }

    for (table, ddl) in &metadata.need_dumping_tables {
        if shutdown_rx.is_cancelled() {
            return Ok(false);
        }

        target
            .execute_source_ddl(Some(&context.target_database), ddl)
            .await?;

        let schema = target
            .table_schema(&context.target_database, table)
            .await?;
        let ordinary_columns = schema.ordinary_columns();

        let watch = Instant::now();
        let mut written_rows = 0u64;
        let mut written_bytes = 0u64;

        let source_table = TableName::new(context.source_database.clone(), table.clone());
        let mut pending: Vec<Row> = Vec::with_capacity(DUMP_BLOCK_ROWS);

        {
            let mut rows = source.stream_table_rows(&source_table).await?;
            while let Some(row) = rows.next().await {
                pending.push(row?);

                if pending.len() >= DUMP_BLOCK_ROWS {
                    if shutdown_rx.is_cancelled() {
                        return Ok(false);
                    }
                    let block = block_from_rows(&ordinary_columns, &pending)?;
                    written_rows += block.rows() as u64;
                    written_bytes += block.bytes() as u64;
                    target
                        .insert_block(&context.target_database, table, block, false)
                        .await?;
                    pending.clear();
                }
            }
        }

        if !pending.is_empty() {
            let block = block_from_rows(&ordinary_columns, &pending)?;
            written_rows += block.rows() as u64;
            written_bytes += block.bytes() as u64;
            target
                .insert_block(&context.target_database, table, block, false)
                .await?;
        }

        let elapsed = watch.elapsed().as_secs_f64().max(f64::EPSILON);
        info!(
            table = %table,
            rows = written_rows,
            bytes = written_bytes,
            elapsed_secs = elapsed,
            rows_per_sec = (written_rows as f64 / elapsed) as u64,
            "dumped table"
        );
    }

    Ok(true)
}

/// Builds an insertable block (user columns only) from source rows.
fn block_from_rows(columns: &[TargetColumnSchema], rows: &[Row]) -> SyncResult<Block> {
    let mut block = Block::from_schema(columns);
    for column_index in 0..columns.len() {
        write_field_values(block.column_mut(column_index)?, rows, column_index, None)?;
    }
    Ok(block)
}
