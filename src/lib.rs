#![deny(missing_docs)]

//! # DynamoDB Mapper
//!
//! A single-table-design mapping and query-planning engine for Amazon
//! DynamoDB.
//!
//! ## Overview
//!
//! Callers work with logical domain entities (plain attribute maps); the
//! engine derives the physical layout and plans every access:
//! - Renames attributes into their key roles and builds composite,
//!   prefix-queryable sort keys
//! - Detects new items and synthesizes timestamp-sortable ids
//! - Selects the index to query under a configurable priority ordering and
//!   builds key conditions and post-filters
//! - Enforces optimistic concurrency through conditional writes and keeps
//!   an immutable version history per entity
//! - Composes root entities with attachments (sub-entities sharing the
//!   parent's partition key)
//! - Computes structural diffs between versions for audit and history views
//!
//! The engine is stateless and side-effect-free except through the injected
//! [`store::StoreClient`], which makes the store pluggable: operations run
//! unchanged over the bundled `aws-sdk-dynamodb` client or the in-memory
//! client used in tests.
//!
//! ## Quick Example
//!
//! ```no_run
//! use dynamodb_mapper::{entity, mapping, store, validate};
//! use serde_json::json;
//!
//! # async fn example() -> dynamodb_mapper::Result<()> {
//! # let sdk_client = aws_sdk_dynamodb::Client::from_conf(
//! #     aws_sdk_dynamodb::config::Config::builder().build(),
//! # );
//! let mapping_config: mapping::MappingConfig = mapping::MappingSpec {
//!     key_attribute_map: indexmap::indexmap! {
//!         mapping::KeyRole::Pk => "paymentId".to_string(),
//!         mapping::KeyRole::GsiPk1 => "orderId".to_string(),
//!     },
//!     sort_key_recipe: vec!["entity".to_string(), "version".to_string()],
//!     index_sort_key_recipe: Some(vec!["entity".to_string(), "status".to_string()]),
//!     queryable_attributes: Vec::new(),
//! }
//! .try_into()?;
//!
//! let client = entity::EntityClient::new(
//!     entity::GlobalConfig {
//!         entity_name: "payment".to_string(),
//!         table_name: "payments".to_string(),
//!         ..Default::default()
//!     },
//!     mapping_config,
//!     mapping::registry::AttachmentRegistry::new(),
//!     store::dynamo::DynamoStoreClient::new(sdk_client),
//!     validate::NoValidation,
//! )?;
//!
//! // Creating: no id, so a partition key is synthesized and the write
//! // asserts the item does not exist yet.
//! let created = client
//!     .update(&json!({"status": "open"}), "user_1", None)
//!     .await?;
//!
//! // Listing by a known attribute: the engine picks the best index.
//! let open = client
//!     .list(&json!({"status": "open"}), entity::ListOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@mapping`] - Static per-entity-type mapping configuration
//! - [`mod@codec`] - Logical/physical entity encoding and decoding
//! - [`mod@query`] - Index selection, query planning, pagination cursors
//! - [`mod@entity`] - The orchestrator: get, list, update, versions,
//!   attachments
//! - [`mod@diff`] - Structural comparison of entity versions
//! - [`mod@store`] - The narrow store-client contract and its
//!   implementations
//! - [`mod@validate`] - The declarative validation gate

/// Logical/physical entity encoding and decoding.
pub mod codec;

/// Structural comparison of logical entities and version chains.
pub mod diff;

/// The orchestrator composing codec, query builder and store client.
pub mod entity;

/// Error taxonomy.
pub mod error;

/// Static mapping configuration.
pub mod mapping;

/// Index selection and query planning.
pub mod query;

/// The store-client contract and its implementations.
pub mod store;

/// The declarative validation gate.
pub mod validate;

pub use codec::Item;
pub use error::{Error, Result};
