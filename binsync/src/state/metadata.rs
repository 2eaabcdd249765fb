use std::collections::BTreeMap;

use binsync_mysql::types::BinlogPosition;
use serde::{Deserialize, Serialize};

/// The replication state persisted per target database.
///
/// The persisted position is always at least as new as every row visible in
/// the target store; the enclosing commit protocol guarantees the pair
/// `(visible rows, position)` moves atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Globally unique identity of the source server the position belongs
    /// to.
    pub source_server_uuid: String,
    /// Name of the source database being mirrored.
    pub source_database: String,
    /// Last committed replication position.
    pub position: BinlogPosition,
    /// Global row version counter; strictly increasing across the lifetime
    /// of the target database, incremented once per applied row event.
    pub version: u64,
    /// The tables currently materialized.
    pub tables: Vec<String>,
    /// Tables still awaiting their initial dump, with the CREATE TABLE
    /// statement captured under the consistent snapshot. Not persisted: a
    /// crash before the dump commits restarts the whole dump.
    #[serde(skip)]
    pub need_dumping_tables: BTreeMap<String, String>,
}

impl SyncMetadata {
    /// Creates the initial state for a first run: version zero and every
    /// table pending its dump.
    pub fn new(
        source_server_uuid: String,
        source_database: String,
        position: BinlogPosition,
        tables: Vec<String>,
    ) -> SyncMetadata {
        SyncMetadata {
            source_server_uuid,
            source_database,
            position,
            version: 0,
            tables,
            need_dumping_tables: BTreeMap::new(),
        }
    }

    /// Increments the version counter and returns the new value.
    pub fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// A copy of the record carrying `position`, for staging a commit.
    pub fn with_position(&self, position: BinlogPosition) -> SyncMetadata {
        SyncMetadata {
            position,
            ..self.clone()
        }
    }
}
