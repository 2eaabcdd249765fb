//! Per-table row buffers with flush-threshold accounting.
//!
//! Buffers are created lazily on the first event for a table and live until
//! the next flush. Four counters drive the flush decision: the largest
//! single buffer (rows and bytes) and the totals across all buffers.

use std::collections::HashMap;

use binsync_config::shared::SyncSettings;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::target::Target;
use crate::types::Block;

/// One table's buffered rows plus the precomputed sorting key positions.
#[derive(Debug)]
pub struct TableBuffer {
    /// Column block matching the target table layout, sign/version trailer
    /// included.
    pub block: Block,
    /// Positions of the sorting key columns within the block.
    pub sorting_key_indices: Vec<usize>,
}

/// The set of all table buffers for one target database.
#[derive(Debug)]
pub struct RowBuffers {
    database: String,
    data: HashMap<String, TableBuffer>,
    max_block_rows: usize,
    max_block_bytes: usize,
    total_blocks_rows: usize,
    total_blocks_bytes: usize,
}

impl RowBuffers {
    /// Creates an empty buffer set for `database`.
    pub fn new(database: impl Into<String>) -> RowBuffers {
        RowBuffers {
            database: database.into(),
            data: HashMap::new(),
            max_block_rows: 0,
            max_block_bytes: 0,
            total_blocks_rows: 0,
            total_blocks_bytes: 0,
        }
    }

    /// Returns the buffer for `table`, creating it on first use.
    ///
    /// Creation introspects the target table: the block mirrors its full
    /// column layout and the sorting key names are resolved to positions.
    pub async fn table_buffer<T>(&mut self, table: &str, target: &T) -> SyncResult<&mut TableBuffer>
    where
        T: Target,
    {
        if !self.data.contains_key(table) {
            let schema = target.table_schema(&self.database, table).await?;
            let mut block = Block::from_schema(&schema.columns);
            block.ensure_sign_version_trailer()?;
            let sorting_key_indices = schema.sorting_key_indices()?;

            debug!(
                table,
                columns = schema.columns.len(),
                "created table buffer"
            );

            self.data.insert(
                table.to_string(),
                TableBuffer {
                    block,
                    sorting_key_indices,
                },
            );
        }

        match self.data.get_mut(table) {
            Some(buffer) => Ok(buffer),
            None => bail!(
                ErrorKind::InvalidState,
                "table buffer disappeared after creation"
            ),
        }
    }

    /// Records the outcome of one applied event.
    ///
    /// `block_rows`/`block_bytes` are the affected buffer's size after the
    /// append, `written_rows`/`written_bytes` the amount the event added.
    pub fn account(
        &mut self,
        block_rows: usize,
        block_bytes: usize,
        written_rows: usize,
        written_bytes: usize,
    ) {
        self.total_blocks_rows += written_rows;
        self.total_blocks_bytes += written_bytes;
        self.max_block_rows = self.max_block_rows.max(block_rows);
        self.max_block_bytes = self.max_block_bytes.max(block_bytes);
    }

    /// Returns `true` if any of the four flush thresholds is reached.
    pub fn exceeds_thresholds(&self, settings: &SyncSettings) -> bool {
        self.max_block_rows >= settings.max_rows_in_buffer
            || self.max_block_bytes >= settings.max_bytes_in_buffer
            || self.total_blocks_rows >= settings.max_rows_in_buffers
            || self.total_blocks_bytes >= settings.max_bytes_in_buffers
    }

    /// Returns `true` if no table has buffered rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes every buffer into its target table and clears the set.
    ///
    /// Blocks are written with the materialized sign/version columns
    /// included. The buffers and counters are cleared even when a write
    /// fails; the enclosing metadata transaction makes the whole flush
    /// all-or-nothing, so half-written state must not survive locally.
    pub async fn flush<T>(&mut self, target: &T) -> SyncResult<()>
    where
        T: Target,
    {
        let mut result = Ok(());

        for (table, buffer) in self.data.drain() {
            if result.is_ok() {
                result = target
                    .insert_block(&self.database, &table, buffer.block, true)
                    .await;
            }
        }

        self.max_block_rows = 0;
        self.max_block_bytes = 0;
        self.total_blocks_rows = 0;
        self.total_blocks_bytes = 0;

        result
    }
}
