use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Buffering and flush-cadence settings for the sync loop.
///
/// Row events accumulate in per-table buffers; a flush is triggered by the
/// first of: a single table crossing its row or byte limit, the aggregate
/// across all tables crossing its row or byte limit, or
/// `max_flush_data_time` elapsing since the previous flush.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncSettings {
    /// Maximum number of rows in a single table buffer before a flush.
    #[serde(default = "default_max_rows_in_buffer")]
    pub max_rows_in_buffer: usize,
    /// Maximum number of bytes in a single table buffer before a flush.
    #[serde(default = "default_max_bytes_in_buffer")]
    pub max_bytes_in_buffer: usize,
    /// Maximum number of rows across all table buffers before a flush.
    #[serde(default = "default_max_rows_in_buffers")]
    pub max_rows_in_buffers: usize,
    /// Maximum number of bytes across all table buffers before a flush.
    #[serde(default = "default_max_bytes_in_buffers")]
    pub max_bytes_in_buffers: usize,
    /// Maximum interval, in milliseconds, between two flushes.
    #[serde(default = "default_max_flush_data_time")]
    pub max_flush_data_time: u64,
    /// Milliseconds to wait between reconnect attempts while the source is
    /// unavailable during the prepare phase.
    #[serde(default = "default_max_wait_time_when_source_unavailable")]
    pub max_wait_time_when_source_unavailable: u64,
}

impl SyncSettings {
    /// Default per-table row limit.
    pub const DEFAULT_MAX_ROWS_IN_BUFFER: usize = 65536;

    /// Default per-table byte limit.
    pub const DEFAULT_MAX_BYTES_IN_BUFFER: usize = 1048576;

    /// Default aggregate row limit.
    pub const DEFAULT_MAX_ROWS_IN_BUFFERS: usize = 65536;

    /// Default aggregate byte limit.
    pub const DEFAULT_MAX_BYTES_IN_BUFFERS: usize = 1048576;

    /// Default flush interval in milliseconds.
    pub const DEFAULT_MAX_FLUSH_DATA_TIME: u64 = 1000;

    /// Default reconnect backoff in milliseconds.
    pub const DEFAULT_MAX_WAIT_TIME_WHEN_SOURCE_UNAVAILABLE: u64 = 1000;

    /// Validates the sync settings.
    ///
    /// Ensures all thresholds are non-zero, since a zero threshold would
    /// force a flush after every event.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("max_rows_in_buffer", self.max_rows_in_buffer),
            ("max_bytes_in_buffer", self.max_bytes_in_buffer),
            ("max_rows_in_buffers", self.max_rows_in_buffers),
            ("max_bytes_in_buffers", self.max_bytes_in_buffers),
        ];

        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::InvalidFieldValue {
                    field: field.to_string(),
                    constraint: "must be greater than 0".to_string(),
                });
            }
        }

        if self.max_flush_data_time == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_flush_data_time".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_rows_in_buffer: default_max_rows_in_buffer(),
            max_bytes_in_buffer: default_max_bytes_in_buffer(),
            max_rows_in_buffers: default_max_rows_in_buffers(),
            max_bytes_in_buffers: default_max_bytes_in_buffers(),
            max_flush_data_time: default_max_flush_data_time(),
            max_wait_time_when_source_unavailable:
                default_max_wait_time_when_source_unavailable(),
        }
    }
}

fn default_max_rows_in_buffer() -> usize {
    SyncSettings::DEFAULT_MAX_ROWS_IN_BUFFER
}

fn default_max_bytes_in_buffer() -> usize {
    SyncSettings::DEFAULT_MAX_BYTES_IN_BUFFER
}

fn default_max_rows_in_buffers() -> usize {
    SyncSettings::DEFAULT_MAX_ROWS_IN_BUFFERS
}

fn default_max_bytes_in_buffers() -> usize {
    SyncSettings::DEFAULT_MAX_BYTES_IN_BUFFERS
}

fn default_max_flush_data_time() -> u64 {
    SyncSettings::DEFAULT_MAX_FLUSH_DATA_TIME
}

fn default_max_wait_time_when_source_unavailable() -> u64 {
    SyncSettings::DEFAULT_MAX_WAIT_TIME_WHEN_SOURCE_UNAVAILABLE
}
