//! Shared builders for the integration tests.
#![allow(dead_code)]

use binsync::state::metadata::SyncMetadata;
use binsync::target::MemoryTarget;
use binsync::test_utils::user_table_schema;
use binsync::types::ColumnKind;
use binsync_config::shared::SyncSettings;
use binsync_mysql::types::{BinlogPosition, FieldValue, Row, RowsEventData};

pub const SOURCE_UUID: &str = "3e11fa47-71ca-11e1-9e33-c80aa9429562";
pub const SOURCE_DATABASE: &str = "shop";
pub const TARGET_DATABASE: &str = "mirror";

/// A position in the first binlog file.
pub fn pos(offset: u64) -> BinlogPosition {
    BinlogPosition::new("binlog.000001", offset)
}

/// Sync settings with thresholds high enough to never trigger on their own.
pub fn quiet_settings() -> SyncSettings {
    SyncSettings {
        max_flush_data_time: 10_000,
        ..SyncSettings::default()
    }
}

/// A `(k: UInt32, v: String)` row image.
pub fn kv_row(key: u64, value: &str) -> Row {
    vec![
        FieldValue::UInt64(key),
        FieldValue::Bytes(value.as_bytes().to_vec()),
    ]
}

/// Rows event data against table `t`.
pub fn rows_event(rows: Vec<Row>) -> RowsEventData {
    RowsEventData {
        table: "t".to_string(),
        rows,
    }
}

/// A memory target with the `t (k UInt32, v String, sorting key k)` table
/// registered.
pub async fn target_with_kv_table() -> MemoryTarget {
    let target = MemoryTarget::new();
    target
        .register_table(
            TARGET_DATABASE,
            "t",
            user_table_schema(
                &[("k", ColumnKind::UInt32), ("v", ColumnKind::String)],
                &["k"],
            ),
        )
        .await;
    target
}

/// Replication metadata as it would look right after a completed dump.
pub fn metadata_at(position: BinlogPosition) -> SyncMetadata {
    SyncMetadata::new(
        SOURCE_UUID.to_string(),
        SOURCE_DATABASE.to_string(),
        position,
        vec!["t".to_string()],
    )
}
