//! Conversion of source field values into typed block columns.
//!
//! Row events deliver fields in a handful of wire shapes (widened integers,
//! doubles, bytes, NULL); the target column type decides how each shape is
//! materialized. The dispatch happens once per column per event, the inner
//! loop is specialized per column variant.

use binsync_mysql::types::{FieldValue, Row};

use crate::error::{ErrorKind, SyncResult};
use crate::bail;
use crate::types::{Column, ColumnData};

/// Appends the `column_index`-th field of every row to `column`.
///
/// `mask`, when present, selects which rows are written; it must be as long
/// as `rows`. Update events use it to write pre-images only when the sorting
/// key changed.
pub fn write_field_values(
    column: &mut Column,
    rows: &[Row],
    column_index: usize,
    mask: Option<&[bool]>,
) -> SyncResult<()> {
    for (row_index, row) in rows.iter().enumerate() {
        if let Some(mask) = mask
            && !mask[row_index]
        {
            continue;
        }

        let Some(value) = row.get(column_index) else {
            bail!(
                ErrorKind::InvalidState,
                "row image is narrower than the target table",
                format!("missing field {column_index} for column `{}`", column.name)
            );
        };

        write_field_value(column, value)?;
    }

    Ok(())
}

/// Appends a single field value to a column, honoring its null map.
fn write_field_value(column: &mut Column, value: &FieldValue) -> SyncResult<()> {
    match &mut column.null_map {
        Some(null_map) => {
            if value.is_null() {
                column.data.push_default();
                null_map.push(1);
                return Ok(());
            }
            null_map.push(0);
        }
        None if value.is_null() => {
            // Row images of NOT NULL columns cannot carry NULL.
            bail!(
                ErrorKind::InvalidState,
                "null field for a non-nullable column",
                column.name
            );
        }
        None => {}
    }

    match (&mut column.data, value) {
        (ColumnData::Int8(values), FieldValue::UInt64(value)) => values.push(*value as i8),
        (ColumnData::Int16(values), FieldValue::UInt64(value)) => values.push(*value as i16),
        (ColumnData::Int64(values), FieldValue::UInt64(value)) => values.push(*value as i64),
        (ColumnData::UInt8(values), FieldValue::UInt64(value)) => values.push(*value as u8),
        (ColumnData::UInt16(values), FieldValue::UInt64(value)) => values.push(*value as u16),
        (ColumnData::UInt32(values), FieldValue::UInt64(value)) => values.push(*value as u32),
        (ColumnData::UInt64(values), FieldValue::UInt64(value)) => values.push(*value),
        (ColumnData::Int32(values), FieldValue::UInt64(value)) => values.push(*value as i32),
        (ColumnData::Int32(values), FieldValue::Int64(value)) => {
            // MEDIUMINT arrives as a signed 64-bit field holding 24 bits of
            // payload; bit 23 is the sign and must be extended manually.
            let narrowed = *value as i32;
            let extended = if narrowed & 0x0080_0000 != 0 {
                narrowed | 0xFF00_0000_u32 as i32
            } else {
                narrowed
            };
            values.push(extended);
        }
        (ColumnData::Float32(values), FieldValue::Float64(value)) => values.push(*value as f32),
        (ColumnData::Float64(values), FieldValue::Float64(value)) => values.push(*value),
        (ColumnData::String(values), FieldValue::Bytes(data)) => values.push(data.clone()),
        (ColumnData::FixedString { values, .. }, FieldValue::Bytes(data)) => {
            values.push(data.clone())
        }
        (data, value) => {
            bail!(
                ErrorKind::UnsupportedType,
                "unsupported field type for target column",
                format!(
                    "{} into {} column `{}`",
                    value.kind_name(),
                    data.kind_name(),
                    column.name
                )
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnKind;

    fn rows_of(values: Vec<FieldValue>) -> Vec<Row> {
        values.into_iter().map(|value| vec![value]).collect()
    }

    #[test]
    fn test_mediumint_sign_extension() {
        let mut column = Column::new("amount", &ColumnKind::Int32);
        let rows = rows_of(vec![
            FieldValue::Int64(0x0080_0000),
            FieldValue::Int64(0x0000_0001),
        ]);

        write_field_values(&mut column, &rows, 0, None).unwrap();

        assert_eq!(column.data, ColumnData::Int32(vec![-8_388_608, 1]));
    }

    #[test]
    fn test_unsigned_truncating_reinterpret() {
        let mut column = Column::new("flag", &ColumnKind::Int8);
        let rows = rows_of(vec![FieldValue::UInt64(0xFF)]);

        write_field_values(&mut column, &rows, 0, None).unwrap();

        assert_eq!(column.data, ColumnData::Int8(vec![-1]));
    }

    #[test]
    fn test_float_narrowing() {
        let mut column = Column::new("ratio", &ColumnKind::Float32);
        let rows = rows_of(vec![FieldValue::Float64(2.5)]);

        write_field_values(&mut column, &rows, 0, None).unwrap();

        assert_eq!(column.data, ColumnData::Float32(vec![2.5]));
    }

    #[test]
    fn test_null_into_nullable_writes_default_and_null_map() {
        let mut column = Column::new("note", &ColumnKind::Nullable(Box::new(ColumnKind::String)));
        let rows = rows_of(vec![
            FieldValue::Bytes(b"x".to_vec()),
            FieldValue::Null,
        ]);

        write_field_values(&mut column, &rows, 0, None).unwrap();

        assert_eq!(
            column.data,
            ColumnData::String(vec![b"x".to_vec(), Vec::new()])
        );
        assert_eq!(column.null_map, Some(vec![0, 1]));
    }

    #[test]
    fn test_null_into_non_nullable_is_invalid() {
        let mut column = Column::new("id", &ColumnKind::UInt32);
        let rows = rows_of(vec![FieldValue::Null]);

        let error = write_field_values(&mut column, &rows, 0, None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_unsupported_combination_fails() {
        let mut column = Column::new("id", &ColumnKind::UInt32);
        let rows = rows_of(vec![FieldValue::Bytes(b"oops".to_vec())]);

        let error = write_field_values(&mut column, &rows, 0, None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn test_mask_skips_unselected_rows() {
        let mut column = Column::new("id", &ColumnKind::UInt32);
        let rows = rows_of(vec![
            FieldValue::UInt64(1),
            FieldValue::UInt64(2),
            FieldValue::UInt64(3),
        ]);

        write_field_values(&mut column, &rows, 0, Some(&[false, true, true])).unwrap();

        assert_eq!(column.data, ColumnData::UInt32(vec![2, 3]));
    }

    #[test]
    fn test_narrow_row_is_invalid() {
        let mut column = Column::new("name", &ColumnKind::String);
        let rows = vec![vec![FieldValue::UInt64(1)]];

        let error = write_field_values(&mut column, &rows, 5, None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }
}
