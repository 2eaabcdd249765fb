use std::future::Future;
use std::time::Duration;

use binsync_mysql::types::{BinlogEvent, BinlogPosition};

use crate::error::SyncResult;

/// Trait for clients that stream parsed events from a MySQL binary log.
///
/// The wire protocol and event parsing live behind this boundary; the sync
/// loop only consumes parsed [`BinlogEvent`]s. Implementations are expected
/// to surface connection loss as an error from [`BinlogClient::read_one_event`],
/// at which point the sync worker exits and the caller decides whether to
/// restart.
pub trait BinlogClient: Send {
    /// Establishes (or re-establishes) the replication connection.
    fn connect(&mut self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Registers as a replica and starts streaming the binary log of
    /// `database` from `position`.
    ///
    /// `server_id` must differ from the ids of other replicas connected to
    /// the same source; a fresh random id per connect is acceptable because
    /// the source does not persist replica identity across connections.
    fn start_binlog_dump(
        &mut self,
        server_id: u32,
        database: &str,
        position: &BinlogPosition,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Reads the next event, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` on timeout, `Ok(Some(event))` on success, and an
    /// error on connection loss.
    fn read_one_event(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = SyncResult<Option<BinlogEvent>>> + Send;

    /// The position immediately after the last successfully read event.
    fn position(&self) -> BinlogPosition;
}
