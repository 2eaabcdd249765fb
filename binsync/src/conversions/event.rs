//! Translation of row events into sign/version-encoded buffer appends.
//!
//! Inserts append rows with sign +1, deletes with sign -1. Updates compare
//! the sorting key of each pre/post image pair: an unchanged key appends one
//! +1 row for the post-image, a changed key cancels the old key with a -1
//! pre-image row and appends a +1 post-image row, both carrying the same
//! version.

use binsync_mysql::types::Row;

use crate::bail;
use crate::conversions::field::write_field_values;
use crate::error::{ErrorKind, SyncResult};
use crate::replication::buffer::TableBuffer;
use crate::types::{SIGN_CANCELLED, SIGN_EXISTS};

/// Appends the rows of a write or delete event to a table buffer.
///
/// All rows carry the given `sign` and `version`. Returns the number of
/// bytes the buffer grew by.
pub fn append_rows(
    buffer: &mut TableBuffer,
    rows: &[Row],
    sign: i8,
    version: u64,
) -> SyncResult<usize> {
    let block = &mut buffer.block;
    let previous_bytes = block.bytes();

    for column_index in 0..block.user_columns() {
        write_field_values(block.column_mut(column_index)?, rows, column_index, None)?;
    }
    block.fill_sign_and_version(sign, version, rows.len())?;

    Ok(block.bytes() - previous_bytes)
}

/// Appends the pre/post image pairs of an update event to a table buffer.
///
/// Every pair shares the same `version`. Returns the number of bytes the
/// buffer grew by.
pub fn append_update_rows(
    buffer: &mut TableBuffer,
    rows: &[Row],
    version: u64,
) -> SyncResult<usize> {
    if rows.len() % 2 != 0 {
        bail!(
            ErrorKind::InvalidState,
            "update event carries an odd number of row images"
        );
    }

    let previous_bytes = buffer.block.bytes();

    // Post-images are always written; a pre-image is written only when the
    // pair's sorting key changed, to cancel the old key.
    let mut writable_rows_mask = vec![false; rows.len()];
    for index in (0..rows.len()).step_by(2) {
        writable_rows_mask[index + 1] = true;
        writable_rows_mask[index] = sorting_key_changed(
            &rows[index],
            &rows[index + 1],
            &buffer.sorting_key_indices,
        );
    }

    let block = &mut buffer.block;
    for column_index in 0..block.user_columns() {
        write_field_values(
            block.column_mut(column_index)?,
            rows,
            column_index,
            Some(&writable_rows_mask),
        )?;
    }

    for index in (0..rows.len()).step_by(2) {
        if !writable_rows_mask[index] {
            block.push_sign_and_version(SIGN_EXISTS, version)?;
        } else {
            // Changing the sorting key is a delete of the old key plus an
            // insert of the new one.
            block.push_sign_and_version(SIGN_CANCELLED, version)?;
            block.push_sign_and_version(SIGN_EXISTS, version)?;
        }
    }

    Ok(block.bytes() - previous_bytes)
}

/// Returns `true` if any sorting key field differs between the two images.
fn sorting_key_changed(pre_image: &Row, post_image: &Row, sorting_key_indices: &[usize]) -> bool {
    sorting_key_indices
        .iter()
        .any(|&index| pre_image.get(index) != post_image.get(index))
}
