//! Index selection and query planning.
//!
//! Given a partial set of known attributes (a filter specification, not a
//! full entity), this module picks the index to query under the configured
//! priority ordering, builds the key condition and equality post-filters,
//! and handles opaque pagination cursors.

/// Opaque pagination-cursor codec.
pub mod cursor;

use crate::{codec, error, mapping, store};
use crate::mapping::recipe;

use serde_json::Value;

/// The sort-key index every partition-side role pairs with.
const SORT_INDEX_NAME: &str = "gsiSk1";

/// A selected index: the partition-side key role to condition on and the
/// index that serves it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IndexSelection {
    /// The index to query.
    pub index_name: String,
    /// The physical attribute of the key condition.
    pub key_role: String,
}

/// Pick the first key role from the priority order that is present among
/// the known attributes.
///
/// Falls back to the entity-type attribute, which every item carries: this
/// guarantees every query is servable by some index, at the cost of a full
/// type-scoped scan when nothing else is known. The priority order is a
/// deliberate design lever: operators re-rank which index absorbs traffic
/// for an access pattern without code changes.
pub fn select_index(
    known_attributes: &codec::Item,
    priority: &[mapping::KeyRole],
) -> IndexSelection {
    for role in priority {
        if known_attributes.contains_key(&**role) {
            return IndexSelection {
                index_name: format!("{}-{SORT_INDEX_NAME}", &**role),
                key_role: role.to_string(),
            };
        }
    }
    IndexSelection {
        index_name: format!("{}-{SORT_INDEX_NAME}", &*mapping::KeyRole::Entity),
        key_role: mapping::KeyRole::Entity.to_string(),
    }
}

/// Arguments for building a list query from an encoded filter
/// specification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQueryArgs<'a> {
    /// The entity type name, used when the key condition falls back to the
    /// entity attribute.
    pub entity_name: &'a str,
    /// Native key to resume from.
    pub exclusive_start_key: Option<codec::Item>,
    /// Maximum number of items to evaluate.
    pub limit: Option<i32>,
    /// The table to query.
    pub table_name: &'a str,
}

/// Build the query for a list operation from an encoded filter
/// specification.
///
/// The chosen key role and the secondary sort key form the key condition;
/// every remaining known attribute becomes an equality clause in the
/// post-filter. Attributes already folded into the sort-key prefix are not
/// re-filtered.
pub fn build_list_query(
    encoded: &codec::EncodedEntity,
    args: ListQueryArgs<'_>,
) -> error::Result<store::QueryRequest> {
    let mut known = encoded.attributes.clone();
    if !encoded.is_new && !encoded.pk.is_empty() {
        known.insert(
            mapping::KeyRole::Pk.to_string(),
            Value::String(encoded.pk.clone()),
        );
    }
    // A just-generated attachment id identifies nothing stored yet; it
    // must serve neither the key condition nor a filter.
    if let Some(generated) = &encoded.generated_id_attribute {
        known.remove(generated);
    }

    let Some(Value::String(gsi_sk1)) = known.get(codec::GSI_SK1) else {
        return Err(error::Error::Mapping(
            "listing requires an index sort key recipe".to_string(),
        ));
    };
    let prefix = recipe::trim_trailing_separator(gsi_sk1).to_string();

    let selection = select_index(&known, &encoded.queryable_attributes);
    let key_value = if selection.key_role == *mapping::KeyRole::Entity {
        Value::String(args.entity_name.to_string())
    } else {
        known[&selection.key_role].clone()
    };

    let mut filters = indexmap::IndexMap::new();
    for (name, value) in &known {
        if *name == selection.key_role
            || name == codec::GSI_SK1
            || encoded.gsi_sk1_contains.contains(name)
        {
            continue;
        }
        filters.insert(name.clone(), value.clone());
    }

    Ok(store::QueryRequest {
        exclusive_start_key: args.exclusive_start_key,
        filters,
        index_name: Some(selection.index_name),
        key_condition: store::KeyCondition {
            name: selection.key_role,
            sort_key: Some(store::SortKeyPrefix {
                name: codec::GSI_SK1.to_string(),
                prefix,
            }),
            value: key_value,
        },
        limit: args.limit,
        table_name: args.table_name.to_string(),
    })
}
