use crate::error::{ErrorKind, SyncResult};
use crate::types::{CellValue, Column, ColumnData, TargetColumnSchema};
use crate::{bail, sync_error};

/// An in-memory column block: a set of equally sized named columns.
///
/// Buffer blocks follow the target table layout, user columns first and the
/// materialized `sign` (`Int8`) and `version` (`UInt64`) columns last.
/// Snapshot blocks carry only the user columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    columns: Vec<Column>,
}

impl Block {
    /// Creates an empty block with one column per schema entry.
    pub fn from_schema(columns: &[TargetColumnSchema]) -> Block {
        Block {
            columns: columns
                .iter()
                .map(|column| Column::new(&column.name, &column.kind))
                .collect(),
        }
    }

    /// The block's columns in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access to the column at `index`.
    pub fn column_mut(&mut self, index: usize) -> SyncResult<&mut Column> {
        let total = self.columns.len();
        self.columns.get_mut(index).ok_or_else(|| {
            sync_error!(
                ErrorKind::InvalidState,
                "column index out of bounds for block",
                format!("index {index}, block has {total} columns")
            )
        })
    }

    /// Number of rows stored, taken from the first column.
    pub fn rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Approximate payload size of the block in bytes.
    pub fn bytes(&self) -> usize {
        self.columns.iter().map(Column::bytes).sum()
    }

    /// Number of user columns, excluding the sign/version trailer.
    pub fn user_columns(&self) -> usize {
        self.columns.len().saturating_sub(2)
    }

    /// Appends one `(sign, version)` pair to the trailer columns.
    pub fn push_sign_and_version(&mut self, sign: i8, version: u64) -> SyncResult<()> {
        let (sign_column, version_column) = self.sign_and_version_columns()?;
        sign_column.push(sign);
        version_column.push(version);
        Ok(())
    }

    /// Appends `count` copies of the same `(sign, version)` pair to the
    /// trailer columns, one per row just written to the user columns.
    pub fn fill_sign_and_version(&mut self, sign: i8, version: u64, count: usize) -> SyncResult<()> {
        let (sign_column, version_column) = self.sign_and_version_columns()?;
        for _ in 0..count {
            sign_column.push(sign);
            version_column.push(version);
        }
        Ok(())
    }

    /// Verifies that the block ends in the `Int8` sign and `UInt64` version
    /// trailer columns.
    pub fn ensure_sign_version_trailer(&mut self) -> SyncResult<()> {
        self.sign_and_version_columns().map(|_| ())
    }

    /// The materialized values of one row, resolving null maps.
    pub fn row_values(&self, row: usize) -> Vec<CellValue> {
        self.columns
            .iter()
            .map(|column| column.value_at(row))
            .collect()
    }

    fn sign_and_version_columns(&mut self) -> SyncResult<(&mut Vec<i8>, &mut Vec<u64>)> {
        let total = self.columns.len();
        if total < 2 {
            bail!(
                ErrorKind::InvalidState,
                "block is too narrow to carry sign/version trailer columns"
            );
        }

        let (_, trailer) = self.columns.split_at_mut(total - 2);
        match trailer {
            [
                Column {
                    data: ColumnData::Int8(sign_column),
                    null_map: None,
                    ..
                },
                Column {
                    data: ColumnData::UInt64(version_column),
                    null_map: None,
                    ..
                },
            ] => Ok((sign_column, version_column)),
            _ => bail!(
                ErrorKind::InvalidState,
                "block does not end in Int8 sign and UInt64 version columns"
            ),
        }
    }
}
