//! The background sync worker: one per mirrored target database.

use std::sync::{Arc, Mutex};

use binsync_config::shared::PipelineConfig;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::replication::apply::SyncLoop;
use crate::replication::client::BinlogClient;
use crate::replication::snapshot::{PrepareContext, prepare_synchronized};
use crate::replication::source::SourceConnection;
use crate::state::store::MetadataStore;
use crate::sync_error;
use crate::target::Target;

/// Side channel where a failed worker records why it stopped.
///
/// The owning handle keeps one end so that queries against a failed replica
/// can report the cause; the worker holds only this slot, not a reference to
/// the handle, which keeps the ownership graph acyclic.
#[derive(Debug, Clone, Default)]
pub struct FailureSlot(Arc<Mutex<Option<(ErrorKind, String)>>>);

impl FailureSlot {
    pub fn new() -> FailureSlot {
        FailureSlot::default()
    }

    /// Records the terminal error of the worker.
    pub(crate) fn record(&self, error: &SyncError) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some((error.kind(), error.to_string()));
        }
    }

    /// The recorded failure, if the worker stopped with an error.
    pub fn get(&self) -> Option<(ErrorKind, String)> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Handle for monitoring the sync worker.
#[derive(Debug)]
pub struct SyncWorkerHandle {
    handle: Option<JoinHandle<SyncResult<()>>>,
}

impl SyncWorkerHandle {
    /// Waits for the sync worker to complete.
    ///
    /// Maps panics and runtime cancellation of the worker task onto
    /// dedicated error kinds.
    pub async fn wait(mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|error| {
            if error.is_cancelled() {
                sync_error!(
                    ErrorKind::SyncWorkerCancelled,
                    "sync worker was cancelled",
                    error
                )
            } else {
                sync_error!(ErrorKind::SyncWorkerPanic, "sync worker panicked", error)
            }
        })??;

        Ok(())
    }
}

/// Worker that mirrors one source database into one target database.
///
/// Runs the prepare phase (preflighted connection, metadata bootstrap,
/// snapshot dump) and then the binlog sync loop, until cancelled or until an
/// unrecoverable error stops it. The worker exclusively owns the binlog
/// client, the metadata and the buffers for its lifetime.
pub struct SyncWorker<S, C, T, M> {
    config: Arc<PipelineConfig>,
    source: S,
    client: C,
    target: T,
    store: M,
    shutdown_rx: ShutdownRx,
    failure: FailureSlot,
}

impl<S, C, T, M> SyncWorker<S, C, T, M>
where
    S: SourceConnection + 'static,
    C: BinlogClient + 'static,
    T: Target + 'static,
    M: MetadataStore + 'static,
{
    pub fn new(
        config: Arc<PipelineConfig>,
        source: S,
        client: C,
        target: T,
        store: M,
        shutdown_rx: ShutdownRx,
        failure: FailureSlot,
    ) -> Self {
        Self {
            config,
            source,
            client,
            target,
            store,
            shutdown_rx,
            failure,
        }
    }

    /// Spawns the worker and returns a handle for monitoring.
    pub fn spawn(self) -> SyncWorkerHandle {
        let span = info_span!("sync_worker", database = %self.config.database);
        let failure = self.failure.clone();

        let worker = async move {
            let result = self.run().await;
            match &result {
                Ok(()) => info!("sync worker completed"),
                Err(error) => {
                    // Log here so the cause is visible even if the handle is
                    // never awaited.
                    error!(error = %error, "sync worker failed");
                    failure.record(error);
                }
            }
            result
        }
        .instrument(span);

        SyncWorkerHandle {
            handle: Some(tokio::spawn(worker)),
        }
    }

    async fn run(self) -> SyncResult<()> {
        let SyncWorker {
            config,
            mut source,
            mut client,
            target,
            store,
            shutdown_rx,
            failure: _,
        } = self;

        let context = PrepareContext {
            source_database: config.source.database.clone(),
            target_database: config.database.clone(),
        };

        let Some(metadata) = prepare_synchronized(
            &context,
            &config.sync,
            &mut source,
            &mut client,
            &target,
            &store,
            &shutdown_rx,
        )
        .await?
        else {
            info!("sync worker cancelled during prepare");
            return Ok(());
        };

        SyncLoop::new(
            &config.sync,
            &config.source.database,
            &config.database,
            client,
            &target,
            &store,
            metadata,
            shutdown_rx,
        )
        .run()
        .await
    }
}
