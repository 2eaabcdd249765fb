use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::{MySqlConnectionConfig, SyncSettings, ValidationError};

/// Configuration for a replication pipeline.
///
/// One pipeline mirrors exactly one source MySQL database into one target
/// database of the analytical store. The target database name doubles as the
/// isolation key for persisted replication state.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Name of the target database the mirrored tables live in.
    pub database: String,
    /// Connection settings for the source MySQL server, including the name
    /// of the source database to mirror.
    pub source: MySqlConnectionConfig,
    /// Directory where the pipeline persists its replication state.
    pub metadata_dir: PathBuf,
    /// Buffering and flush cadence settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl PipelineConfig {
    /// Validates the pipeline configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "database".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        self.source.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}
