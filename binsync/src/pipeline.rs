//! The replication pipeline: the owning handle of one mirrored database.

use std::sync::Arc;

use binsync_config::shared::PipelineConfig;
use binsync_mysql::replication::db::extract_server_version;
use tracing::{info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::metrics::register_metrics;
use crate::replication::client::BinlogClient;
use crate::replication::preflight::check_source_and_get_version;
use crate::replication::source::SourceConnection;
use crate::state::store::MetadataStore;
use crate::target::Target;
use crate::workers::sync::{FailureSlot, SyncWorker, SyncWorkerHandle};

#[derive(Debug)]
enum PipelineState {
    Created,
    Started { worker: SyncWorkerHandle },
}

/// Handle owning the replication of one source database into one target
/// database.
///
/// The pipeline validates the source configuration, spawns the background
/// sync worker and controls its lifecycle. When the worker stops with an
/// error the cause is retained on the handle (see [`Pipeline::sync_error`])
/// so that users querying the failed replica can learn why it is stale;
/// restarting after a failure is an operator action.
#[derive(Debug)]
pub struct Pipeline<S, C, T, M> {
    config: Arc<PipelineConfig>,
    source: Option<S>,
    client: Option<C>,
    target: T,
    store: Option<M>,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
    failure: FailureSlot,
}

impl<S, C, T, M> Pipeline<S, C, T, M>
where
    S: SourceConnection + 'static,
    C: BinlogClient + 'static,
    T: Target + Clone + 'static,
    M: MetadataStore + 'static,
{
    /// Creates a pipeline in the `Created` state.
    ///
    /// Fails when the configuration does not validate. Call
    /// [`Pipeline::start`] to begin replication.
    pub fn new(
        config: PipelineConfig,
        source: S,
        client: C,
        target: T,
        store: M,
    ) -> SyncResult<Self> {
        config.validate().map_err(|error| {
            SyncError::with_source(
                ErrorKind::ValidationError,
                "invalid pipeline configuration",
                error,
            )
        })?;
        register_metrics();

        let (shutdown_tx, shutdown_rx) = create_shutdown();

        Ok(Pipeline {
            config: Arc::new(config),
            source: Some(source),
            client: Some(client),
            target,
            store: Some(store),
            state: PipelineState::Created,
            shutdown_tx,
            shutdown_rx,
            failure: FailureSlot::new(),
        })
    }

    /// Runs the preflight check against the source and spawns the sync
    /// worker.
    ///
    /// Misconfiguration of the source
    /// ([`ErrorKind::IllegalSourceConfig`]) fails here, on the caller,
    /// rather than inside the background worker.
    pub async fn start(&mut self) -> SyncResult<()> {
        if matches!(self.state, PipelineState::Started { .. }) {
            bail!(ErrorKind::InvalidState, "pipeline is already started");
        }

        info!(
            database = %self.config.database,
            source_database = %self.config.source.database,
            "starting replication pipeline"
        );

        let (Some(mut source), Some(client), Some(store)) =
            (self.source.take(), self.client.take(), self.store.take())
        else {
            bail!(ErrorKind::InvalidState, "pipeline was already consumed");
        };

        let version = check_source_and_get_version(&mut source).await?;
        match extract_server_version(&version) {
            Some(numeric) => info!(
                version = %version,
                numeric = numeric.get(),
                "source passed replication preflight"
            ),
            None => warn!(version = %version, "could not parse source server version"),
        }

        let worker = SyncWorker::new(
            self.config.clone(),
            source,
            client,
            self.target.clone(),
            store,
            self.shutdown_rx.clone(),
            self.failure.clone(),
        )
        .spawn();

        self.state = PipelineState::Started { worker };
        Ok(())
    }

    /// Initiates a graceful shutdown of the sync worker.
    ///
    /// The worker notices the flag at its next suspension point, rolls back
    /// any open source transaction, discards uncommitted buffers and exits.
    pub fn shutdown(&self) {
        info!("sending shutdown signal to sync worker");
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for the sync worker to complete and returns its result.
    pub async fn wait(self) -> SyncResult<()> {
        match self.state {
            PipelineState::Created => {
                info!("pipeline was not started, skipping wait");
                Ok(())
            }
            PipelineState::Started { worker } => worker.wait().await,
        }
    }

    /// Signals a graceful shutdown and waits for the worker to complete.
    pub async fn shutdown_and_wait(self) -> SyncResult<()> {
        self.shutdown();
        self.wait().await
    }

    /// The terminal error of the sync worker, if it stopped with one.
    pub fn sync_error(&self) -> Option<(ErrorKind, String)> {
        self.failure.get()
    }

    /// A clone of the failure side channel, for callers that need the
    /// worker's terminal error after [`Pipeline::wait`] consumed the
    /// handle.
    pub fn failure_slot(&self) -> FailureSlot {
        self.failure.clone()
    }
}
