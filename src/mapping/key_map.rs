use crate::{error, mapping};

use indexmap::IndexMap;

/// Bidirectional map between logical attribute names and physical key roles.
///
/// Built once at configuration-load time from the declarative role map; both
/// directions are materialized so neither encode nor decode re-derives the
/// reversed mapping per call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyAttributeMap {
    logical_to_physical: IndexMap<String, String>,
    physical_to_logical: IndexMap<String, String>,
}

impl KeyAttributeMap {
    /// Build the map from a role assignment, validating that a `pk` mapping
    /// exists, that only real key roles are assigned, and that no logical
    /// attribute is assigned twice.
    pub fn from_roles(roles: &IndexMap<mapping::KeyRole, String>) -> error::Result<Self> {
        let mut logical_to_physical = IndexMap::with_capacity(roles.len());
        let mut physical_to_logical = IndexMap::with_capacity(roles.len());
        for (role, logical) in roles {
            if *role == mapping::KeyRole::Entity {
                return Err(error::Error::Mapping(
                    "the entity marker cannot be assigned a logical attribute".to_string(),
                ));
            }
            if logical_to_physical
                .insert(logical.clone(), role.to_string())
                .is_some()
            {
                return Err(error::Error::Mapping(format!(
                    "logical attribute `{logical}` is mapped to more than one key role"
                )));
            }
            physical_to_logical.insert(role.to_string(), logical.clone());
        }
        if !physical_to_logical.contains_key(&*mapping::KeyRole::Pk) {
            return Err(error::Error::Mapping(
                "a partition key mapping is required".to_string(),
            ));
        }
        Ok(Self {
            logical_to_physical,
            physical_to_logical,
        })
    }

    /// The physical key role a logical attribute is mapped to, if any.
    pub fn to_physical(&self, logical: &str) -> Option<&str> {
        self.logical_to_physical.get(logical).map(String::as_str)
    }

    /// The logical attribute a physical key role carries, if any.
    pub fn to_logical(&self, physical: &str) -> Option<&str> {
        self.physical_to_logical.get(physical).map(String::as_str)
    }

    /// The logical attribute mapped to the partition key.
    pub fn partition_key_attribute(&self) -> &str {
        self.physical_to_logical[&*mapping::KeyRole::Pk].as_str()
    }
}
