use crate::{error, mapping};

use indexmap::IndexMap;

/// Mapping configuration for a sub-entity that shares its parent's
/// partition key.
///
/// The attachment's full entity type name is namespaced under the parent
/// (`{parent}_{entity_name}`), and its generated id carries that namespaced
/// prefix.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentConfig {
    /// The sub-entity name, e.g. `method` for a `payment_method` attachment
    /// of a `payment` entity.
    pub entity_name: String,
    /// The logical attribute holding the attachment's generated id.
    pub id_attribute: String,
    /// The attachment's own mapping configuration. Its `pk` role maps to
    /// the parent's id attribute, since attachments share the parent
    /// partition.
    pub mapping: mapping::MappingConfig,
}

/// Registry of attachment configurations, looked up by name.
///
/// A tagged registry instead of polymorphic dispatch: unknown names are a
/// configuration defect and fail with
/// [`ResourceNotFound`](error::Error::ResourceNotFound).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttachmentRegistry {
    configs: IndexMap<String, AttachmentConfig>,
}

impl AttachmentRegistry {
    /// An empty registry, for entity types without attachments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attachment configuration under its name.
    pub fn insert(&mut self, name: impl Into<String>, config: AttachmentConfig) {
        self.configs.insert(name.into(), config);
    }

    /// Look up an attachment configuration by name.
    pub fn get(&self, name: &str) -> error::Result<&AttachmentConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| error::Error::ResourceNotFound(name.to_string()))
    }
}
