//! A scripted binlog client for driving the sync loop in tests.

use std::collections::VecDeque;
use std::time::Duration;

use binsync_mysql::types::{BinlogEvent, BinlogPosition};

use crate::concurrency::shutdown::ShutdownTx;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::replication::client::BinlogClient;

/// One scripted outcome of a `read_one_event` call.
#[derive(Debug)]
pub enum ScriptedRead {
    /// Deliver an event; the client's position advances to the given
    /// position (the position after the event).
    Event(BinlogEvent, BinlogPosition),
    /// Fail the read, e.g. to simulate connection loss mid-stream.
    Fail(ErrorKind, &'static str),
}

/// Binlog client that replays a scripted sequence of reads.
///
/// Once the script is exhausted, reads behave like timeouts. Optionally the
/// client consumes the full read deadline before timing out (so time-based
/// flushes fire) and/or raises a shutdown flag (so loop tests terminate).
#[derive(Debug)]
pub struct ScriptedBinlogClient {
    reads: VecDeque<ScriptedRead>,
    position: BinlogPosition,
    shutdown_on_drain: Option<ShutdownTx>,
    sleep_on_drain: bool,
    /// Every `start_binlog_dump` call: `(server_id, database, position)`.
    pub started_dumps: Vec<(u32, String, BinlogPosition)>,
    /// Number of `connect` calls observed.
    pub connect_calls: usize,
}

impl ScriptedBinlogClient {
    pub fn new(reads: Vec<ScriptedRead>) -> ScriptedBinlogClient {
        ScriptedBinlogClient {
            reads: reads.into(),
            position: BinlogPosition::default(),
            shutdown_on_drain: None,
            sleep_on_drain: false,
            started_dumps: Vec::new(),
            connect_calls: 0,
        }
    }

    /// Raises the shutdown flag when the script runs dry, terminating the
    /// sync loop after it processed everything.
    pub fn with_shutdown_on_drain(mut self, shutdown_tx: ShutdownTx) -> Self {
        self.shutdown_on_drain = Some(shutdown_tx);
        self
    }

    /// Consumes the full read deadline once the script runs dry, so the
    /// loop's time-based flush fires before it observes cancellation.
    pub fn with_sleep_on_drain(mut self) -> Self {
        self.sleep_on_drain = true;
        self
    }
}

impl BinlogClient for ScriptedBinlogClient {
    async fn connect(&mut self) -> SyncResult<()> {
        self.connect_calls += 1;
        Ok(())
    }

    async fn start_binlog_dump(
        &mut self,
        server_id: u32,
        database: &str,
        position: &BinlogPosition,
    ) -> SyncResult<()> {
        self.started_dumps
            .push((server_id, database.to_string(), position.clone()));
        self.position = position.clone();
        Ok(())
    }

    async fn read_one_event(&mut self, timeout: Duration) -> SyncResult<Option<BinlogEvent>> {
        match self.reads.pop_front() {
            Some(ScriptedRead::Event(event, position)) => {
                self.position = position;
                Ok(Some(event))
            }
            Some(ScriptedRead::Fail(kind, description)) => {
                Err(SyncError::new(kind, description))
            }
            None => {
                if let Some(shutdown_tx) = &self.shutdown_on_drain {
                    let _ = shutdown_tx.send(true);
                }
                if self.sleep_on_drain {
                    tokio::time::sleep(timeout).await;
                }
                Ok(None)
            }
        }
    }

    fn position(&self) -> BinlogPosition {
        self.position.clone()
    }
}
