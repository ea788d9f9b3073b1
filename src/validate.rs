//! Declarative validation gate.
//!
//! The engine treats validation purely as a gate in front of encoding: a
//! validator receives the operation being performed and the raw entity, and
//! either returns the (possibly normalized) entity or fails with a
//! [`Validation`](crate::Error::Validation) error that is reported to the
//! caller verbatim. The engine never inspects the schema representation, so
//! any schema library can sit behind the trait.

use crate::error;

use serde_json::Value;
use std::fmt;

/// The operation a request is validated for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// Creation of a new entity (an update without an identity).
    Create,
    /// Point lookup of an entity or one of its versions.
    Get,
    /// Listing entities by a partial filter specification.
    List,
    /// Mutation of an existing entity.
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
        };
        formatter.write_str(name)
    }
}

/// Schema gate invoked before every encode.
pub trait Validator {
    /// Validate `entity` for `operation`.
    ///
    /// Implementations backed by a schema library should return
    /// [`MissingSchema`](crate::Error::MissingSchema) when no schema was
    /// configured for the operation, and
    /// [`Validation`](crate::Error::Validation) with the offending field
    /// and message on a schema mismatch.
    fn validate(&self, operation: Operation, entity: &Value) -> error::Result<Value>;
}

/// A validator that passes every entity through unchanged.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct NoValidation;

impl Validator for NoValidation {
    fn validate(&self, _operation: Operation, entity: &Value) -> error::Result<Value> {
        Ok(entity.clone())
    }
}
