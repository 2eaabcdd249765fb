use std::borrow::Cow;
use std::{error, fmt, result};

/// Type alias for convenience when using the Result type with our Error.
pub type SyncResult<T> = result::Result<T, SyncError>;

/// Internal error representation with kind, description and optional detail
/// and source error.
///
/// Uses boxing to keep the public error type size consistent and enable rich
/// error context without penalizing the success path.
struct ErrorInner {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<String>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

/// Error classification for replication operations.
///
/// Kinds drive the disposition of a failure: whether the prepare phase
/// retries, whether the sync loop swallows it and continues, or whether the
/// worker exits and marks the target database failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The source server is missing configuration required for row-based
    /// replication.
    IllegalSourceConfig,
    /// Connection to the source server failed or was lost.
    SourceConnectionFailed,
    /// A query against the source server failed.
    QueryExecutionFailed,
    /// An internal consistency invariant was violated.
    InvalidState,
    /// A source field cannot be converted into the target column type.
    UnsupportedType,
    /// The target's DDL translator rejected a forwarded statement.
    DdlSyntaxError,
    /// Writing a block into the target store failed.
    TargetWriteFailed,
    /// A table is missing from the target store.
    TableNotFound,
    /// Reading the persisted replication metadata failed.
    MetadataReadFailed,
    /// Writing the persisted replication metadata failed.
    MetadataWriteFailed,
    /// The persisted replication metadata is unreadable or of a foreign
    /// format.
    MetadataCorrupted,
    /// Configuration was rejected during validation.
    ValidationError,
    /// The sync worker panicked.
    SyncWorkerPanic,
    /// The sync worker task was cancelled by the runtime.
    SyncWorkerCancelled,
    /// I/O failure outside of the metadata store.
    Io,
}

/// A stable error type for the replication library.
///
/// Provides a stable public API while allowing internal error details to
/// evolve. Supports error chaining and kind-based classification.
pub struct SyncError(Box<ErrorInner>);

impl SyncError {
    /// Creates a new error with the specified kind and description.
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        SyncError(Box::new(ErrorInner {
            kind,
            description: description.into(),
            detail: None,
            source: None,
        }))
    }

    /// Creates a new error with the specified kind, description and source
    /// error.
    pub fn with_source<E>(
        kind: ErrorKind,
        description: impl Into<Cow<'static, str>>,
        source: E,
    ) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        SyncError(Box::new(ErrorInner {
            kind,
            description: description.into(),
            detail: None,
            source: Some(source.into()),
        }))
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    /// Returns the additional detail attached to the error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.0.detail.as_deref()
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        SyncError::new(kind, description)
    }
}

impl From<(ErrorKind, String)> for SyncError {
    fn from((kind, description): (ErrorKind, String)) -> Self {
        SyncError::new(kind, description)
    }
}

impl From<(ErrorKind, &'static str, String)> for SyncError {
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        let mut error = SyncError::new(kind, description);
        error.0.detail = Some(detail);
        error
    }
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        SyncError::with_source(ErrorKind::Io, "I/O operation failed", error)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.description)?;
        if let Some(detail) = &self.0.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(source) = &self.0.source {
            write!(f, " (caused by: {source})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncError")
            .field("kind", &self.0.kind)
            .field("description", &self.0.description)
            .field("detail", &self.0.detail)
            .field("source", &self.0.source)
            .finish()
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}
