mod block;
mod column;
mod schema;

pub use block::Block;
pub use column::{CellValue, Column, ColumnData, ColumnKind};
pub use schema::{TargetColumnSchema, TargetTableSchema};

/// Sign value marking a row as existing.
pub const SIGN_EXISTS: i8 = 1;

/// Sign value cancelling a prior row with the same sorting key.
pub const SIGN_CANCELLED: i8 = -1;
