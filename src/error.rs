use std::error;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the mapping and query-planning engine.
///
/// Store-client errors that do not map to a conditional-write loss are passed
/// through as [`Error::Store`] without reinterpretation. The engine never
/// retries on its own: retry policy belongs to the store client or the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A conditional write lost an optimistic-concurrency race.
    ///
    /// A racing create or a racing delete-then-create fails the write rather
    /// than corrupting state. Callers should surface this as a conflict.
    #[error("conditional write failed for `{pk}` / `{sk}`")]
    ConditionFailed {
        /// Partition key of the item that lost the race.
        pk: String,
        /// Sort key of the item that lost the race.
        sk: String,
    },

    /// A pagination cursor could not be decoded back into a native key.
    #[error("invalid pagination cursor")]
    Cursor(#[source] Box<dyn error::Error + Send + Sync>),

    /// The entity handed to encode or decode was not an object.
    #[error("malformed entity object")]
    MalformedEntity,

    /// A mapping configuration is internally inconsistent.
    ///
    /// Raised at configuration-load time, never during an operation.
    #[error("invalid mapping configuration: {0}")]
    Mapping(String),

    /// A schema required for the requested operation was not provided.
    #[error("required schema for this call not provided: {0}")]
    MissingSchema(String),

    /// No attachment with the given name exists in the registry.
    ///
    /// A configuration defect: the registry is static, so an unknown name
    /// means the caller and the configuration disagree.
    #[error("no attachment with the name `{0}` found")]
    ResourceNotFound(String),

    /// Conversion between logical values and store attribute values failed.
    #[error(transparent)]
    Serde(#[from] serde_dynamo::Error),

    /// The store client failed; the underlying error is passed through.
    #[error("{operation} on table `{table}` failed")]
    Store {
        /// The store operation that failed.
        operation: &'static str,
        /// The table the operation targeted.
        table: String,
        /// The underlying store-client error.
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },

    /// The configured data source is not supported by this engine.
    #[error("unsupported data source `{0}`")]
    UnsupportedDataSource(String),

    /// A request failed the declarative validation gate.
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        /// The offending field, as reported by the validator.
        field: String,
        /// The validator's message, reported verbatim.
        message: String,
    },
}
