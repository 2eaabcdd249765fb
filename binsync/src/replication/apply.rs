//! The sync loop: pull binlog events, translate them into buffer appends,
//! and periodically commit the buffers together with the new replication
//! position.
//!
//! Committing is all-or-nothing: the new position is staged in the metadata
//! store, the buffers are written to the target, and only then does the
//! staged record become durable. A crash between the target writes and the
//! metadata commit replays the same binlog range on restart, which the
//! sign/version encoding tolerates because the version counter is re-derived
//! from the last committed record.

use std::time::{Duration, Instant};

use binsync_config::shared::SyncSettings;
use binsync_mysql::types::{BinlogEvent, BinlogPosition, QueryEventData, RowsEventData};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::conversions::event::{append_rows, append_update_rows};
use crate::error::{ErrorKind, SyncResult};
use crate::metrics::{
    BINSYNC_DDL_SYNTAX_ERRORS_TOTAL, BINSYNC_EVENTS_APPLIED_TOTAL, BINSYNC_FLUSHES_TOTAL,
    BINSYNC_FLUSH_DURATION_SECONDS, DATABASE_LABEL, EVENT_TYPE_LABEL,
};
use crate::replication::buffer::RowBuffers;
use crate::replication::client::BinlogClient;
use crate::state::metadata::SyncMetadata;
use crate::state::store::{MetadataStore, StagedMetadata};
use crate::target::Target;
use crate::types::{SIGN_CANCELLED, SIGN_EXISTS};

/// The sync loop over one target database.
///
/// Owns the binlog client, the metadata and the buffer set for its whole
/// lifetime; the target store and metadata store are shared handles.
pub struct SyncLoop<'a, C, T, M> {
    settings: &'a SyncSettings,
    source_database: &'a str,
    target_database: &'a str,
    client: C,
    target: &'a T,
    store: &'a M,
    metadata: SyncMetadata,
    buffers: RowBuffers,
    shutdown_rx: ShutdownRx,
    /// Position after the most recently applied event; trails the client's
    /// position by exactly one event while one is being handled.
    last_event_position: BinlogPosition,
}

impl<'a, C, T, M> SyncLoop<'a, C, T, M>
where
    C: BinlogClient,
    T: Target,
    M: MetadataStore,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        settings: &'a SyncSettings,
        source_database: &'a str,
        target_database: &'a str,
        client: C,
        target: &'a T,
        store: &'a M,
        metadata: SyncMetadata,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        let buffers = RowBuffers::new(target_database);
        let last_event_position = metadata.position.clone();

        Self {
            settings,
            source_database,
            target_database,
            client,
            target,
            store,
            metadata,
            buffers,
            shutdown_rx,
            last_event_position,
        }
    }

    /// Runs until cancelled or until an error terminates the stream.
    ///
    /// On cancellation, buffered rows that were not yet committed are
    /// discarded; they will be replayed from the persisted position on the
    /// next start.
    pub async fn run(mut self) -> SyncResult<()> {
        let max_flush_time = Duration::from_millis(self.settings.max_flush_data_time);
        let mut watch = Instant::now();

        while !self.shutdown_rx.is_cancelled() {
            let deadline = max_flush_time
                .saturating_sub(watch.elapsed())
                .max(Duration::from_millis(1));

            let event = self.client.read_one_event(deadline).await?;
            if let Some(event) = event {
                self.on_event(event).await?;
            }

            if watch.elapsed() > max_flush_time || self.buffers.exceeds_thresholds(self.settings) {
                watch = Instant::now();

                if !self.buffers.is_empty() {
                    self.commit(self.client.position()).await?;
                }
            }
        }

        if self.buffers.is_empty() {
            info!("sync loop cancelled");
        } else {
            info!("sync loop cancelled, discarding uncommitted buffers");
        }
        Ok(())
    }

    /// Translates one binlog event.
    async fn on_event(&mut self, event: BinlogEvent) -> SyncResult<()> {
        let event_type = event.event_type();

        match event {
            BinlogEvent::WriteRows(event) => {
                self.apply_rows_event(&event, SIGN_EXISTS).await?;
            }
            BinlogEvent::DeleteRows(event) => {
                self.apply_rows_event(&event, SIGN_CANCELLED).await?;
            }
            BinlogEvent::UpdateRows(event) => {
                let version = self.metadata.next_version();
                let written_rows = event.rows.len();
                let (block_rows, block_bytes, written_bytes) = {
                    let buffer = self
                        .buffers
                        .table_buffer(&event.table, self.target)
                        .await?;
                    let written_bytes = append_update_rows(buffer, &event.rows, version)?;
                    (buffer.block.rows(), buffer.block.bytes(), written_bytes)
                };
                self.buffers
                    .account(block_rows, block_bytes, written_rows, written_bytes);
            }
            BinlogEvent::Query(event) => {
                self.on_query_event(event).await?;
            }
            BinlogEvent::Heartbeat => {}
            BinlogEvent::Other { kind } => {
                debug!(event = %kind, "skipping binlog event");
            }
        }

        counter!(
            BINSYNC_EVENTS_APPLIED_TOTAL,
            DATABASE_LABEL => self.target_database.to_string(),
            EVENT_TYPE_LABEL => event_type.to_string()
        )
        .increment(1);

        self.last_event_position = self.client.position();
        Ok(())
    }

    /// Applies a write or delete event: all rows share one fresh version and
    /// the given sign.
    async fn apply_rows_event(&mut self, event: &RowsEventData, sign: i8) -> SyncResult<()> {
        let version = self.metadata.next_version();
        let written_rows = event.rows.len();

        let (block_rows, block_bytes, written_bytes) = {
            let buffer = self
                .buffers
                .table_buffer(&event.table, self.target)
                .await?;
            let written_bytes = append_rows(buffer, &event.rows, sign, version)?;
            (buffer.block.rows(), buffer.block.bytes(), written_bytes)
        };

        self.buffers
            .account(block_rows, block_bytes, written_rows, written_bytes);
        Ok(())
    }

    /// Handles a statement event: commit pending rows at the pre-statement
    /// position, forward the DDL, then commit the post-statement position.
    ///
    /// Translator syntax errors are logged and skipped; replication may
    /// still diverge on later events, which the warning metric makes
    /// visible. Any other translator error is fatal.
    async fn on_query_event(&mut self, event: QueryEventData) -> SyncResult<()> {
        self.commit(self.last_event_position.clone()).await?;

        let scoped_database =
            (event.schema == self.source_database).then_some(self.target_database);

        match self
            .target
            .execute_source_ddl(scoped_database, &event.query)
            .await
        {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::DdlSyntaxError => {
                warn!(error = %error, "skipping DDL statement the translator rejected");
                counter!(
                    BINSYNC_DDL_SYNTAX_ERRORS_TOTAL,
                    DATABASE_LABEL => self.target_database.to_string()
                )
                .increment(1);
            }
            Err(error) => return Err(error),
        }

        self.commit(self.client.position()).await
    }

    /// Commits the buffered rows and `position` atomically.
    ///
    /// The staged metadata only becomes durable after every buffer reached
    /// the target; on failure the staged record is aborted and the loop
    /// terminates with the flush error.
    async fn commit(&mut self, position: BinlogPosition) -> SyncResult<()> {
        let watch = Instant::now();

        let staged_metadata = self.metadata.with_position(position.clone());
        let staged = self.store.stage(&staged_metadata).await?;

        match self.buffers.flush(self.target).await {
            Ok(()) => {
                staged.commit().await?;
                self.metadata.position = position;

                counter!(
                    BINSYNC_FLUSHES_TOTAL,
                    DATABASE_LABEL => self.target_database.to_string()
                )
                .increment(1);
                histogram!(
                    BINSYNC_FLUSH_DURATION_SECONDS,
                    DATABASE_LABEL => self.target_database.to_string()
                )
                .record(watch.elapsed().as_secs_f64());

                debug!(position = %self.metadata.position, "committed flush");
                Ok(())
            }
            Err(error) => {
                if let Err(abort_error) = staged.abort().await {
                    warn!(error = %abort_error, "failed to abort staged metadata");
                }
                Err(error)
            }
        }
    }
}
