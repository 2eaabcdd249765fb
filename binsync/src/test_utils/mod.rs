//! Scripted fakes and builders for tests.

pub mod client;
pub mod source;

use crate::types::{ColumnKind, TargetColumnSchema, TargetTableSchema};

/// Builds a target table schema from user columns and a sorting key, with
/// the materialized sign/version trailer appended.
pub fn user_table_schema(
    columns: &[(&str, ColumnKind)],
    sorting_key: &[&str],
) -> TargetTableSchema {
    let mut all_columns: Vec<TargetColumnSchema> = columns
        .iter()
        .map(|(name, kind)| TargetColumnSchema::new(*name, kind.clone()))
        .collect();
    all_columns.push(TargetColumnSchema::materialized("sign", ColumnKind::Int8));
    all_columns.push(TargetColumnSchema::materialized(
        "version",
        ColumnKind::UInt64,
    ));

    TargetTableSchema::new(
        all_columns,
        sorting_key.iter().map(|name| name.to_string()).collect(),
    )
}
