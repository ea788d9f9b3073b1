//! The narrow store-client contract the engine depends on.
//!
//! The core never calls a store SDK directly: every operation goes through
//! [`StoreClient`], making the store pluggable. Two implementations ship
//! with the crate: one over `aws-sdk-dynamodb` and an in-memory one used in
//! tests and local development.

/// `aws-sdk-dynamodb` implementation.
pub mod dynamo;

/// In-memory implementation honoring the engine's guard and update
/// semantics.
pub mod memory;

use crate::codec;
use crate::error;

use indexmap::IndexMap;
use serde_json::Value;

/// Key condition of a query: an equality on a partition-side attribute,
/// optionally narrowed by a `begins_with` on a sort-side attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyCondition {
    /// The physical name of the partition-side attribute.
    pub name: String,
    /// Optional `begins_with` narrowing on the index sort key.
    pub sort_key: Option<SortKeyPrefix>,
    /// The value the partition-side attribute must equal.
    pub value: Value,
}

/// `begins_with` constraint on a sort-side attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortKeyPrefix {
    /// The physical name of the sort-side attribute.
    pub name: String,
    /// The prefix the attribute must begin with. Trailing separators must
    /// already be trimmed.
    pub prefix: String,
}

/// A query against the base table or one of its indexes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryRequest {
    /// Native key to resume from, for pagination.
    pub exclusive_start_key: Option<codec::Item>,
    /// Equality post-filters, applied by the store after the index narrows
    /// the candidate set. Filters do not reduce consumed read capacity.
    pub filters: IndexMap<String, Value>,
    /// The index to query, or `None` for the base table.
    pub index_name: Option<String>,
    /// The key condition.
    pub key_condition: KeyCondition,
    /// Maximum number of items to evaluate.
    pub limit: Option<i32>,
    /// The table to query.
    pub table_name: String,
}

/// The result of a query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    /// The matching items, in index order.
    pub items: Vec<codec::Item>,
    /// The native key to resume from, when more items remain.
    pub last_evaluated_key: Option<codec::Item>,
}

/// Existence precondition of a conditional write.
///
/// This is the engine's sole concurrency control: a racing create or a
/// racing delete-then-create fails the write rather than corrupting state.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ExistenceGuard {
    /// `attribute_exists(pk) AND attribute_exists(sk)`: the item must
    /// already exist (update of an existing item).
    MustExist,
    /// `attribute_not_exists(pk) AND attribute_not_exists(sk)`: the item
    /// must not exist yet (creation).
    MustNotExist,
    /// No precondition. Used for attachment updates, whose existence cannot
    /// be known in advance.
    #[default]
    Unguarded,
}

/// A conditional update of a single item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateRequest {
    /// Numeric attributes to increment atomically (`ADD`).
    pub add: IndexMap<String, i64>,
    /// The existence precondition.
    pub guard: ExistenceGuard,
    /// The partition key of the item.
    pub pk: String,
    /// Attributes to remove from the item.
    pub remove: Vec<String>,
    /// Attributes to set on the item.
    pub set: codec::Item,
    /// The sort key of the item.
    pub sk: String,
    /// The table to write to.
    pub table_name: String,
}

/// The narrow interface between the engine and the wide-column store.
///
/// Retries, timeouts and connection management are entirely the
/// implementor's concern: the engine never retries and passes store errors
/// through unmodified.
pub trait StoreClient {
    /// Point lookup by full primary key. `None` when the item does not
    /// exist.
    fn get_item(
        &self,
        table_name: &str,
        pk: &str,
        sk: &str,
    ) -> impl Future<Output = error::Result<Option<codec::Item>>> + Send;

    /// Run a query and return one page of results.
    fn query(&self, request: QueryRequest) -> impl Future<Output = error::Result<QueryResponse>> + Send;

    /// Apply a conditional update and return the full updated item.
    ///
    /// A lost precondition must surface as
    /// [`ConditionFailed`](error::Error::ConditionFailed), never as a
    /// silent retry.
    fn conditional_update(
        &self,
        request: UpdateRequest,
    ) -> impl Future<Output = error::Result<codec::Item>> + Send;

    /// Write an item unconditionally.
    fn put_item(
        &self,
        table_name: &str,
        item: codec::Item,
    ) -> impl Future<Output = error::Result<()>> + Send;
}
