use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Row;

/// A position in the source server's binary log.
///
/// Positions are totally ordered: binlog file names carry a monotonically
/// increasing numeric suffix, so the derived lexicographic order matches the
/// order in which the files were written.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BinlogPosition {
    /// Name of the binlog file, e.g. `binlog.000042`.
    pub file: String,
    /// Byte offset within the file.
    pub offset: u64,
}

impl BinlogPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> BinlogPosition {
        Self {
            file: file.into(),
            offset,
        }
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}

/// Row data carried by a write, update or delete event.
///
/// For update events `rows` alternates between pre-images (even indices) and
/// post-images (odd indices); for write and delete events every entry is a
/// full row image.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsEventData {
    /// Name of the source table the rows belong to.
    pub table: String,
    /// Full row images in the order they appear in the binlog record.
    pub rows: Vec<Row>,
}

/// A statement (DDL) event from the binary log.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEventData {
    /// The schema the statement was executed against.
    pub schema: String,
    /// The statement text.
    pub query: String,
}

/// A single parsed event from the source server's binary log.
#[derive(Debug, Clone, PartialEq)]
pub enum BinlogEvent {
    /// Rows inserted into a source table.
    WriteRows(RowsEventData),
    /// Rows updated in a source table, as pre/post image pairs.
    UpdateRows(RowsEventData),
    /// Rows deleted from a source table.
    DeleteRows(RowsEventData),
    /// A statement event, in practice always DDL under row-based logging.
    Query(QueryEventData),
    /// Replication heartbeat, carries no data.
    Heartbeat,
    /// Any event type the sync loop does not process.
    Other {
        /// Human readable name of the event type, used for debug logging.
        kind: String,
    },
}

impl BinlogEvent {
    /// Returns the [`EventType`] that corresponds to this event.
    pub fn event_type(&self) -> EventType {
        self.into()
    }
}

/// Classification of binlog event types without the associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    WriteRows,
    UpdateRows,
    DeleteRows,
    Query,
    Heartbeat,
    Other,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteRows => write!(f, "write_rows"),
            Self::UpdateRows => write!(f, "update_rows"),
            Self::DeleteRows => write!(f, "delete_rows"),
            Self::Query => write!(f, "query"),
            Self::Heartbeat => write!(f, "heartbeat"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl From<&BinlogEvent> for EventType {
    fn from(event: &BinlogEvent) -> Self {
        match event {
            BinlogEvent::WriteRows(_) => EventType::WriteRows,
            BinlogEvent::UpdateRows(_) => EventType::UpdateRows,
            BinlogEvent::DeleteRows(_) => EventType::DeleteRows,
            BinlogEvent::Query(_) => EventType::Query,
            BinlogEvent::Heartbeat => EventType::Heartbeat,
            BinlogEvent::Other { .. } => EventType::Other,
        }
    }
}
