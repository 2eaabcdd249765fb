use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::ColumnKind;

/// Schema of a single column of a materialized target table.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetColumnSchema {
    /// The name of the column.
    pub name: String,
    /// The column type.
    pub kind: ColumnKind,
    /// Whether the column is materialized (computed by the store) rather
    /// than supplied by inserts. The sign/version trailer columns are
    /// materialized; user columns are not.
    pub materialized: bool,
}

impl TargetColumnSchema {
    /// Creates an ordinary (insertable) column schema.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> TargetColumnSchema {
        Self {
            name: name.into(),
            kind,
            materialized: false,
        }
    }

    /// Creates a materialized column schema.
    pub fn materialized(name: impl Into<String>, kind: ColumnKind) -> TargetColumnSchema {
        Self {
            name: name.into(),
            kind,
            materialized: true,
        }
    }
}

/// Schema of a materialized target table, as reported by the target store.
///
/// Columns are in physical order: user columns first, then the materialized
/// sign/version trailer. The sorting key names the columns the store orders
/// rows by; it identifies logical duplicates for merge-on-read.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTableSchema {
    /// All physical columns, materialized trailer last.
    pub columns: Vec<TargetColumnSchema>,
    /// Names of the sorting key columns, in key order.
    pub sorting_key: Vec<String>,
}

impl TargetTableSchema {
    pub fn new(columns: Vec<TargetColumnSchema>, sorting_key: Vec<String>) -> TargetTableSchema {
        Self {
            columns,
            sorting_key,
        }
    }

    /// The insertable columns, i.e. everything except the materialized
    /// trailer.
    pub fn ordinary_columns(&self) -> Vec<TargetColumnSchema> {
        self.columns
            .iter()
            .filter(|column| !column.materialized)
            .cloned()
            .collect()
    }

    /// Resolves the sorting key column names into positions within the
    /// physical column order.
    pub fn sorting_key_indices(&self) -> SyncResult<Vec<usize>> {
        self.sorting_key
            .iter()
            .map(|key_column| {
                self.columns
                    .iter()
                    .position(|column| &column.name == key_column)
                    .ok_or_else(|| {
                        sync_error!(
                            ErrorKind::InvalidState,
                            "sorting key column is missing from the table schema",
                            key_column
                        )
                    })
            })
            .collect()
    }
}
