mod event;
mod schema;
mod value;

pub use event::{BinlogEvent, BinlogPosition, EventType, QueryEventData, RowsEventData};
pub use schema::TableName;
pub use value::{FieldValue, Row};
