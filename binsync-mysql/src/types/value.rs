use mysql_async::Value;

/// An untyped field value as it arrives from the source server.
///
/// Row events carry full row images whose fields are one of a handful of
/// wire-level shapes; the mapping onto concrete target column types happens
/// later, when the value is appended to a column block. Integers narrower
/// than 64 bits travel widened to 64 bits, strings and binary data travel as
/// raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Any unsigned integer type, widened to 64 bits.
    UInt64(u64),
    /// Any signed integer type, widened to 64 bits.
    Int64(i64),
    /// Any floating point type, widened to 64 bits.
    Float64(f64),
    /// String or binary data, including the textual form of temporal values.
    Bytes(Vec<u8>),
}

/// A single row image: one field value per source column, in column order.
pub type Row = Vec<FieldValue>;

impl FieldValue {
    /// Returns `true` if the field is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short name of the value shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::UInt64(_) => "unsigned integer",
            FieldValue::Int64(_) => "signed integer",
            FieldValue::Float64(_) => "floating point",
            FieldValue::Bytes(_) => "bytes",
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::NULL => FieldValue::Null,
            Value::Bytes(data) => FieldValue::Bytes(data),
            Value::Int(value) => FieldValue::Int64(value),
            Value::UInt(value) => FieldValue::UInt64(value),
            Value::Float(value) => FieldValue::Float64(f64::from(value)),
            Value::Double(value) => FieldValue::Float64(value),
            // Temporal values only show up on the binary protocol; the text
            // protocol used for table scans delivers them as bytes already.
            Value::Date(year, month, day, hour, minute, second, micro) => {
                FieldValue::Bytes(
                    format!(
                        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micro:06}"
                    )
                    .into_bytes(),
                )
            }
            Value::Time(negative, days, hours, minutes, seconds, micro) => {
                let sign = if negative { "-" } else { "" };
                let hours = u32::from(hours) + days * 24;
                FieldValue::Bytes(
                    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micro:06}").into_bytes(),
                )
            }
        }
    }
}
