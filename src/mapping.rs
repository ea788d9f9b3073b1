//! Mapping configuration: the static, per-entity-type description of how
//! logical attributes are laid out over the physical key schema.
//!
//! Configuration is plain data. The bidirectional attribute map is built once
//! when the configuration is loaded, not re-derived per call, and attachment
//! configurations are looked up by name in a registry map.

/// Bidirectional logical name to physical key-role map.
pub mod key_map;

/// Composite sort-key recipes.
pub mod recipe;

/// Attachment configuration registry.
pub mod registry;

use crate::error;

use indexmap::IndexMap;
use serde::Deserialize;
use std::ops;

/// Physical key roles an attribute can be mapped to or queried by.
///
/// The order in which roles appear in
/// [`MappingConfig::queryable_attributes`] determines index selection
/// priority when listing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
pub enum KeyRole {
    /// The partition key of the base table.
    #[serde(rename = "pk")]
    Pk,
    /// The partition key of the first global secondary index.
    #[serde(rename = "gsiPk1")]
    GsiPk1,
    /// The partition key of the second global secondary index.
    #[serde(rename = "gsiPk2")]
    GsiPk2,
    /// The partition key of the third global secondary index.
    #[serde(rename = "gsiPk3")]
    GsiPk3,
    /// The entity-type marker attribute, present on every item.
    ///
    /// Not a real key role: it exists so that every query is servable by
    /// some index, at the cost of a full type-scoped scan.
    #[serde(rename = "entity")]
    Entity,
}

impl ops::Deref for KeyRole {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Pk => "pk",
            Self::GsiPk1 => "gsiPk1",
            Self::GsiPk2 => "gsiPk2",
            Self::GsiPk3 => "gsiPk3",
            Self::Entity => "entity",
        }
    }
}

/// Default index-selection priority, used when a configuration does not
/// provide its own ordering.
pub const DEFAULT_QUERYABLE_ATTRIBUTES: [KeyRole; 4] =
    [KeyRole::Pk, KeyRole::GsiPk1, KeyRole::GsiPk2, KeyRole::Entity];

/// Declarative mapping configuration for one entity type, as written by the
/// operator.
///
/// ```rust
/// use dynamodb_mapper::mapping;
///
/// let spec = mapping::MappingSpec {
///     key_attribute_map: indexmap::indexmap! {
///         mapping::KeyRole::Pk => "paymentId".to_string(),
///         mapping::KeyRole::GsiPk1 => "orderId".to_string(),
///     },
///     sort_key_recipe: vec!["entity".to_string(), "version".to_string()],
///     index_sort_key_recipe: None,
///     queryable_attributes: Vec::new(),
/// };
/// let config: mapping::MappingConfig = spec.try_into().unwrap();
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MappingSpec {
    /// Physical key role per logical attribute name. At most one logical
    /// attribute per role; a `pk` mapping is required.
    pub key_attribute_map: IndexMap<KeyRole, String>,
    /// Ordered logical attribute names concatenated into the primary sort
    /// key.
    pub sort_key_recipe: Vec<String>,
    /// Ordered logical attribute names concatenated into the secondary
    /// index sort key, if the entity participates in one.
    #[serde(default)]
    pub index_sort_key_recipe: Option<Vec<String>>,
    /// Index-selection priority. Empty means
    /// [`DEFAULT_QUERYABLE_ATTRIBUTES`].
    #[serde(default)]
    pub queryable_attributes: Vec<KeyRole>,
}

/// Validated mapping configuration, ready for use by the codec and the
/// query builder.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingConfig {
    key_map: key_map::KeyAttributeMap,
    queryable_attributes: Vec<KeyRole>,
    recipes: recipe::SortKeyRecipes,
}

impl MappingConfig {
    /// The bidirectional logical/physical attribute map.
    pub fn key_map(&self) -> &key_map::KeyAttributeMap {
        &self.key_map
    }

    /// The index-selection priority order.
    pub fn queryable_attributes(&self) -> &[KeyRole] {
        &self.queryable_attributes
    }

    /// The sort-key recipes.
    pub fn recipes(&self) -> &recipe::SortKeyRecipes {
        &self.recipes
    }
}

impl TryFrom<MappingSpec> for MappingConfig {
    type Error = error::Error;

    fn try_from(spec: MappingSpec) -> error::Result<Self> {
        let key_map = key_map::KeyAttributeMap::from_roles(&spec.key_attribute_map)?;
        if spec.sort_key_recipe.is_empty() {
            return Err(error::Error::Mapping(
                "the sort key recipe must name at least one attribute".to_string(),
            ));
        }
        let queryable_attributes = if spec.queryable_attributes.is_empty() {
            DEFAULT_QUERYABLE_ATTRIBUTES.to_vec()
        } else {
            spec.queryable_attributes
        };
        let recipes = recipe::SortKeyRecipes {
            gsi_sk1: spec.index_sort_key_recipe,
            sk: spec.sort_key_recipe,
        };
        Ok(Self {
            key_map,
            queryable_attributes,
            recipes,
        })
    }
}
