use std::future::Future;

use crate::error::SyncResult;
use crate::state::metadata::SyncMetadata;

/// Trait for durable storage of the per-database replication state.
///
/// The store participates in the atomic commit protocol: a new record is
/// first staged, then the caller performs its target-store side effects, and
/// only a successful [`StagedMetadata::commit`] makes the record visible to
/// future loads. Either the side effects succeeded and the new position is
/// durable, or neither change is observable.
pub trait MetadataStore: Send + Sync {
    /// The staged-commit guard type.
    type Staged: StagedMetadata + Send;

    /// Loads the persisted record, or `None` on a first run.
    fn load(&self) -> impl Future<Output = SyncResult<Option<SyncMetadata>>> + Send;

    /// Stages `metadata` for an atomic commit.
    fn stage(
        &self,
        metadata: &SyncMetadata,
    ) -> impl Future<Output = SyncResult<Self::Staged>> + Send;
}

/// A staged metadata record awaiting its commit or abort.
pub trait StagedMetadata {
    /// Makes the staged record durable.
    fn commit(self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Discards the staged record, leaving the previous one in place.
    fn abort(self) -> impl Future<Output = SyncResult<()>> + Send;
}
