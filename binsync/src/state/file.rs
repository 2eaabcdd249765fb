//! File-backed metadata store using a write-then-rename protocol.
//!
//! The record lives in a single `.metadata` file. Staging serializes the new
//! record to a sibling `.metadata.tmp` file and fsyncs it; committing
//! renames the temporary file over the final path. A crash between the
//! target-store side effects and the rename replays the binlog range since
//! the previous record, which the sign/version encoding tolerates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::state::metadata::SyncMetadata;
use crate::state::store::{MetadataStore, StagedMetadata};
use crate::sync_error;

/// Fixed marker distinguishing the record from unrelated files.
const METADATA_MAGIC: &str = "binsync.metadata";

/// Bumped when the record layout changes incompatibly.
const METADATA_FORMAT_VERSION: u32 = 1;

/// File name of the persisted record within the metadata directory.
const METADATA_FILE_NAME: &str = ".metadata";

/// On-disk representation: the record wrapped with its format header.
#[derive(Serialize, Deserialize)]
struct MetadataDocument {
    magic: String,
    format_version: u32,
    #[serde(flatten)]
    metadata: SyncMetadata,
}

/// Metadata store persisting one record per target database under the
/// database's metadata directory.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    path: PathBuf,
}

impl FileMetadataStore {
    /// Creates a store rooted at `metadata_dir`.
    pub fn new(metadata_dir: impl AsRef<Path>) -> FileMetadataStore {
        FileMetadataStore {
            path: metadata_dir.as_ref().join(METADATA_FILE_NAME),
        }
    }

    /// The path of the persisted record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }
}

impl MetadataStore for FileMetadataStore {
    type Staged = StagedFile;

    async fn load(&self) -> SyncResult<Option<SyncMetadata>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(SyncError::with_source(
                    ErrorKind::MetadataReadFailed,
                    "failed to read replication metadata",
                    error,
                ));
            }
        };

        let document: MetadataDocument = serde_json::from_slice(&contents).map_err(|error| {
            SyncError::with_source(
                ErrorKind::MetadataCorrupted,
                "replication metadata is not parseable",
                error,
            )
        })?;

        if document.magic != METADATA_MAGIC {
            return Err(sync_error!(
                ErrorKind::MetadataCorrupted,
                "replication metadata carries a foreign magic value",
                document.magic
            ));
        }
        if document.format_version != METADATA_FORMAT_VERSION {
            return Err(sync_error!(
                ErrorKind::MetadataCorrupted,
                "replication metadata format version is not supported",
                document.format_version
            ));
        }

        Ok(Some(document.metadata))
    }

    async fn stage(&self, metadata: &SyncMetadata) -> SyncResult<StagedFile> {
        let document = MetadataDocument {
            magic: METADATA_MAGIC.to_string(),
            format_version: METADATA_FORMAT_VERSION,
            metadata: metadata.clone(),
        };
        let contents = serde_json::to_vec_pretty(&document).map_err(|error| {
            SyncError::with_source(
                ErrorKind::MetadataWriteFailed,
                "failed to serialize replication metadata",
                error,
            )
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| write_error("failed to create metadata directory", error))?;
        }

        let staging_path = self.staging_path();
        tokio::fs::write(&staging_path, &contents)
            .await
            .map_err(|error| write_error("failed to write staged metadata", error))?;

        let file = tokio::fs::File::open(&staging_path)
            .await
            .map_err(|error| write_error("failed to open staged metadata", error))?;
        file.sync_all()
            .await
            .map_err(|error| write_error("failed to sync staged metadata", error))?;

        debug!(path = %staging_path.display(), "staged metadata record");

        Ok(StagedFile {
            staging_path,
            final_path: self.path.clone(),
        })
    }
}

/// A staged metadata file; committing renames it over the final path.
#[derive(Debug)]
pub struct StagedFile {
    staging_path: PathBuf,
    final_path: PathBuf,
}

impl StagedMetadata for StagedFile {
    async fn commit(self) -> SyncResult<()> {
        tokio::fs::rename(&self.staging_path, &self.final_path)
            .await
            .map_err(|error| write_error("failed to publish staged metadata", error))
    }

    async fn abort(self) -> SyncResult<()> {
        match tokio::fs::remove_file(&self.staging_path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(write_error("failed to remove staged metadata", error)),
        }
    }
}

fn write_error(description: &'static str, error: std::io::Error) -> SyncError {
    SyncError::with_source(ErrorKind::MetadataWriteFailed, description, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binsync_mysql::types::BinlogPosition;

    fn metadata() -> SyncMetadata {
        let mut metadata = SyncMetadata::new(
            "3e11fa47-71ca-11e1-9e33-c80aa9429562".to_string(),
            "shop".to_string(),
            BinlogPosition::new("binlog.000007", 1234),
            vec!["orders".to_string(), "users".to_string()],
        );
        metadata.version = 42;
        metadata
    }

    #[tokio::test]
    async fn test_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stage_commit_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        let staged = store.stage(&metadata()).await.unwrap();
        staged.commit().await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, metadata());
        assert!(loaded.need_dumping_tables.is_empty());
    }

    #[tokio::test]
    async fn test_staged_record_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        let _staged = store.stage(&metadata()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_abort_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        let first = metadata();
        store.stage(&first).await.unwrap().commit().await.unwrap();

        let mut second = first.clone();
        second.version = 100;
        store.stage(&second).await.unwrap().abort().await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap().version, 42);
    }

    #[tokio::test]
    async fn test_foreign_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        tokio::fs::write(
            store.path(),
            r#"{
                "magic": "something-else",
                "format_version": 1,
                "source_server_uuid": "uuid",
                "source_database": "shop",
                "position": {"file": "binlog.000001", "offset": 4},
                "version": 0,
                "tables": []
            }"#,
        )
        .await
        .unwrap();

        let error = store.load().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MetadataCorrupted);
    }

    #[tokio::test]
    async fn test_garbage_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path());

        tokio::fs::write(store.path(), b"not json").await.unwrap();

        let error = store.load().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MetadataCorrupted);
    }
}
