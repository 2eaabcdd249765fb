use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: String,
        constraint: String,
    },
    /// The source connection is missing a required setting.
    #[error("Invalid source connection config: {0}")]
    SourceConnection(String),
}
