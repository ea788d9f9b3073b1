//! Bidirectional mapping between logical entities and physical items.
//!
//! Encoding renames logical attributes into their key roles, detects
//! new-vs-existing items, stamps audit metadata, builds composite sort keys,
//! and partitions attributes into creation-only and mutable groups. Decoding
//! reverses the rename and strips transport-only fields. Both directions are
//! pure: no store access, no side effects.

use crate::{error, mapping};
use crate::mapping::{recipe, registry};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// A logical entity or physical item: an attribute map over JSON values.
pub type Item = serde_json::Map<String, Value>;

/// Attributes written once at creation and never updated afterwards.
const CREATION_ATTRIBUTES: [&str; 4] = ["version", "entity", "createdAt", "createdBy"];

/// Key attributes of the base table; keys, not attributes, in the encoded
/// response.
const KEY_ATTRIBUTES: [&str; 2] = ["pk", "sk"];

/// The physical attribute holding the secondary-index sort key.
pub(crate) const GSI_SK1: &str = "gsiSk1";

/// The physical attribute marking the entity type.
pub(crate) const ENTITY_ATTRIBUTE: &str = "entity";

fn generate_ulid() -> String {
    ulid::Ulid::new().to_string()
}

/// The result of encoding a logical entity into its physical form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedEntity {
    /// Mutable attributes, including derived index keys (`gsiPk*`,
    /// `gsiSk1`) but excluding `pk`/`sk`.
    pub attributes: Item,
    /// Attributes written only on creation: `entity`, `version`,
    /// `createdAt`, `createdBy`.
    pub creation_attributes: Item,
    /// The physical name of the attachment id attribute, when its value
    /// was generated during this encode. A generated id identifies nothing
    /// yet, so query planning must not treat it as a known attribute.
    pub generated_id_attribute: Option<String>,
    /// Physical names of the secondary sort-key recipe entries that were
    /// satisfied, in recipe order.
    pub gsi_sk1_contains: Vec<String>,
    /// Physical names of the secondary sort-key recipe entries that were
    /// not reached because construction stopped early.
    pub gsi_sk1_misses: Vec<String>,
    /// Whether the entity carried no identity and is therefore new.
    pub is_new: bool,
    /// The partition key; synthesized for new root entities.
    pub pk: String,
    /// The index-selection priority for this entity type.
    pub queryable_attributes: Vec<mapping::KeyRole>,
    /// The sort-key recipes used, for partial-update recomputation.
    pub recipes: recipe::SortKeyRecipes,
    /// The primary sort key.
    pub sk: String,
    /// The bidirectional attribute map used, for partial-update
    /// recomputation.
    pub used_key_map: mapping::key_map::KeyAttributeMap,
}

/// Encoder/decoder for one entity type (root or attachment).
#[derive(Clone, Debug)]
pub struct EntityCodec {
    attachment_id_attribute: Option<String>,
    entity_name: String,
    id_generator: fn() -> String,
    mapping: mapping::MappingConfig,
}

impl EntityCodec {
    /// Codec for a root entity type, which owns its partition key.
    pub fn new(entity_name: impl Into<String>, mapping: mapping::MappingConfig) -> Self {
        Self {
            attachment_id_attribute: None,
            entity_name: entity_name.into(),
            id_generator: generate_ulid,
            mapping,
        }
    }

    /// Codec for an entity type that is itself an attachment (a non-root
    /// entity carrying its own generated id under `id_attribute`).
    pub fn for_sub_entity(
        entity_name: impl Into<String>,
        mapping: mapping::MappingConfig,
        id_attribute: impl Into<String>,
    ) -> Self {
        Self {
            attachment_id_attribute: Some(id_attribute.into()),
            entity_name: entity_name.into(),
            id_generator: generate_ulid,
            mapping,
        }
    }

    /// Codec for a registered attachment of `parent_entity`.
    ///
    /// The attachment's entity type name is namespaced under the parent, so
    /// its items and generated ids read `{parent}_{attachment}` and never
    /// collide with the parent's own sort-key range.
    pub fn for_attachment(parent_entity: &str, config: &registry::AttachmentConfig) -> Self {
        Self::for_sub_entity(
            format!("{parent_entity}_{}", config.entity_name),
            config.mapping.clone(),
            config.id_attribute.clone(),
        )
    }

    /// Replace the id generator. Generated ids must be unique and
    /// timestamp-sortable; the default is a ULID.
    pub fn with_id_generator(mut self, id_generator: fn() -> String) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// The entity type name this codec encodes.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Whether this codec encodes an attachment rather than a root entity.
    pub fn is_attachment(&self) -> bool {
        self.attachment_id_attribute.is_some()
    }

    /// Encode a logical entity into its physical form.
    ///
    /// With an `executor_id`, `updatedAt`/`updatedBy` are stamped always and
    /// `createdAt`/`createdBy` only when the entity is new.
    pub fn encode(&self, entity: &Value, executor_id: Option<&str>) -> error::Result<EncodedEntity> {
        let Some(entity) = entity.as_object() else {
            return Err(error::Error::MalformedEntity);
        };
        let mut entity = entity.clone();

        if self.is_attachment() {
            entity.insert(
                ENTITY_ATTRIBUTE.to_string(),
                Value::String(self.entity_name.clone()),
            );
        } else if !entity.contains_key(ENTITY_ATTRIBUTE) {
            entity.insert(
                ENTITY_ATTRIBUTE.to_string(),
                Value::String(self.entity_name.clone()),
            );
        }
        if matches!(entity.get(recipe::VERSION_ATTRIBUTE), None | Some(Value::Null)) {
            entity.insert(recipe::VERSION_ATTRIBUTE.to_string(), Value::from(0));
        }

        let mut is_new = false;
        let mut generated_id = None;
        if let Some(id_attribute) = &self.attachment_id_attribute {
            is_new = matches!(entity.get(id_attribute), None | Some(Value::Null));
            if is_new {
                entity.insert(
                    id_attribute.clone(),
                    Value::String(format!("{}_{}", self.entity_name, (self.id_generator)())),
                );
                generated_id = Some(id_attribute.clone());
            }
        }

        let key_map = self.mapping.key_map();
        let mut renamed = Item::with_capacity(entity.len());
        for (name, value) in entity {
            match key_map.to_physical(&name) {
                Some(physical) => renamed.insert(physical.to_string(), value),
                None => renamed.insert(name, value),
            };
        }

        if self.attachment_id_attribute.is_none() {
            is_new = !renamed.contains_key(&*mapping::KeyRole::Pk);
        }

        if let Some(executor_id) = executor_id {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            renamed.insert("updatedAt".to_string(), Value::String(now.clone()));
            renamed.insert("updatedBy".to_string(), Value::String(executor_id.to_string()));
            if is_new {
                renamed.insert("createdAt".to_string(), Value::String(now));
                renamed.insert("createdBy".to_string(), Value::String(executor_id.to_string()));
            }
        }

        let recipes = self.mapping.recipes().clone();
        let sk = self.build_sort_key(&recipes.sk, &renamed, &mut Vec::new())?;
        let mut gsi_sk1_contains = Vec::new();
        let mut gsi_sk1_misses = Vec::new();
        if let Some(gsi_recipe) = &recipes.gsi_sk1 {
            let gsi_sk1 = self.build_sort_key(gsi_recipe, &renamed, &mut gsi_sk1_contains)?;
            renamed.insert(GSI_SK1.to_string(), Value::String(gsi_sk1));
            if gsi_sk1_contains.len() != gsi_recipe.len() {
                for logical in gsi_recipe {
                    let physical = key_map.to_physical(logical).unwrap_or(logical);
                    if !gsi_sk1_contains.iter().any(|name| name == physical) {
                        gsi_sk1_misses.push(physical.to_string());
                    }
                }
            }
        }

        let pk = match renamed.remove(&*mapping::KeyRole::Pk) {
            Some(value) => recipe::render_segment(&*mapping::KeyRole::Pk, &value)?,
            None if is_new && !self.is_attachment() => {
                format!("{}_{}", self.entity_name, (self.id_generator)())
            }
            None => String::new(),
        };

        let mut attributes = Item::new();
        let mut creation_attributes = Item::new();
        for (name, value) in renamed {
            if value.is_null() || KEY_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            if CREATION_ATTRIBUTES.contains(&name.as_str()) {
                creation_attributes.insert(name, value);
            } else {
                attributes.insert(name, value);
            }
        }

        let generated_id_attribute = generated_id
            .map(|logical| key_map.to_physical(&logical).unwrap_or(logical.as_str()).to_string());

        Ok(EncodedEntity {
            attributes,
            creation_attributes,
            generated_id_attribute,
            gsi_sk1_contains,
            gsi_sk1_misses,
            is_new,
            pk,
            queryable_attributes: self.mapping.queryable_attributes().to_vec(),
            recipes,
            sk,
            used_key_map: key_map.clone(),
        })
    }

    /// Decode a physical item back into its logical form.
    ///
    /// Transport-only fields (`sk`, `gsiSk1`, the `entity` marker) are
    /// stripped: callers never need them.
    pub fn decode(&self, item: &Value) -> error::Result<Item> {
        let Some(item) = item.as_object() else {
            return Err(error::Error::MalformedEntity);
        };
        let key_map = self.mapping.key_map();
        let mut decoded = Item::with_capacity(item.len());
        for (name, value) in item {
            if matches!(name.as_str(), "sk" | GSI_SK1 | ENTITY_ATTRIBUTE) {
                continue;
            }
            match key_map.to_logical(name) {
                Some(logical) => decoded.insert(logical.to_string(), value.clone()),
                None => decoded.insert(name.clone(), value.clone()),
            };
        }
        Ok(decoded)
    }

    fn build_sort_key(
        &self,
        recipe_attributes: &[String],
        renamed: &Item,
        contains: &mut Vec<String>,
    ) -> error::Result<String> {
        let key_map = self.mapping.key_map();
        let mut value = String::new();
        for (position, logical) in recipe_attributes.iter().enumerate() {
            let physical = key_map.to_physical(logical).unwrap_or(logical);
            if position != 0 {
                value.push_str(recipe::KEY_SEPARATOR);
            }
            match renamed.get(physical) {
                None | Some(Value::Null) => break,
                Some(present) => {
                    value.push_str(&recipe::render_segment(physical, present)?);
                    contains.push(physical.to_string());
                }
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indexmap::indexmap;
    use rstest::rstest;
    use serde_json::json;

    fn payment_codec() -> EntityCodec {
        let config: mapping::MappingConfig = mapping::MappingSpec {
            key_attribute_map: indexmap! {
                mapping::KeyRole::Pk => "paymentId".to_string(),
                mapping::KeyRole::GsiPk1 => "orderId".to_string(),
                mapping::KeyRole::GsiPk2 => "productId".to_string(),
            },
            sort_key_recipe: vec!["entity".to_string(), "version".to_string()],
            index_sort_key_recipe: Some(vec![
                "entity".to_string(),
                "productId".to_string(),
                "status".to_string(),
            ]),
            queryable_attributes: Vec::new(),
        }
        .try_into()
        .unwrap();
        EntityCodec::new("payment", config)
    }

    fn method_codec() -> EntityCodec {
        let config: mapping::MappingConfig = mapping::MappingSpec {
            key_attribute_map: indexmap! {
                mapping::KeyRole::Pk => "paymentId".to_string(),
            },
            sort_key_recipe: vec![
                "entity".to_string(),
                "paymentMethodId".to_string(),
                "version".to_string(),
            ],
            index_sort_key_recipe: Some(vec!["entity".to_string(), "status".to_string()]),
            queryable_attributes: Vec::new(),
        }
        .try_into()
        .unwrap();
        EntityCodec::for_sub_entity("payment_method", config, "paymentMethodId")
    }

    #[rstest]
    fn existing_payment_encodes_to_expected_keys() {
        let encoded = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "status": "open"}), None)
            .unwrap();
        assert_eq!(encoded.pk, "payment_123");
        assert_eq!(encoded.sk, "payment#version_0");
        assert!(!encoded.is_new);
        assert_eq!(encoded.attributes.get("status"), Some(&json!("open")));
        assert_eq!(
            encoded.creation_attributes.get("entity"),
            Some(&json!("payment"))
        );
        assert_eq!(encoded.creation_attributes.get("version"), Some(&json!(0)));
    }

    #[rstest]
    fn new_payment_gets_generated_partition_key() {
        let encoded = payment_codec()
            .encode(&json!({"status": "open"}), None)
            .unwrap();
        assert!(encoded.is_new);
        assert!(encoded.pk.starts_with("payment_"));
        assert!(encoded.pk.len() > "payment_".len());
    }

    #[rstest]
    fn non_object_input_is_malformed() {
        let result = payment_codec().encode(&json!("not an object"), None);
        assert!(matches!(result, Err(error::Error::MalformedEntity)));
        let result = payment_codec().decode(&json!(42));
        assert!(matches!(result, Err(error::Error::MalformedEntity)));
    }

    #[rstest]
    fn secondary_sort_key_tracks_contains_and_misses() {
        let encoded = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "status": "open"}), None)
            .unwrap();
        // productId missing: construction stops after the entity segment.
        assert_eq!(encoded.attributes.get(GSI_SK1), Some(&json!("payment#")));
        assert_eq!(encoded.gsi_sk1_contains, vec!["entity".to_string()]);
        assert_eq!(
            encoded.gsi_sk1_misses,
            vec!["gsiPk2".to_string(), "status".to_string()]
        );

        let encoded = payment_codec()
            .encode(
                &json!({"paymentId": "payment_123", "productId": "prod_1", "status": "open"}),
                None,
            )
            .unwrap();
        assert_eq!(
            encoded.attributes.get(GSI_SK1),
            Some(&json!("payment#prod_1#open"))
        );
        assert!(encoded.gsi_sk1_misses.is_empty());
    }

    #[rstest]
    fn sort_key_ignores_attributes_outside_the_recipe() {
        let left = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "note": "a"}), None)
            .unwrap();
        let right = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "note": "b"}), None)
            .unwrap();
        assert_eq!(left.sk, right.sk);
    }

    #[rstest]
    fn executor_stamps_depend_on_newness() {
        let existing = payment_codec()
            .encode(
                &json!({"paymentId": "payment_123", "status": "open"}),
                Some("user_1"),
            )
            .unwrap();
        assert!(existing.attributes.contains_key("updatedAt"));
        assert_eq!(existing.attributes.get("updatedBy"), Some(&json!("user_1")));
        assert!(!existing.creation_attributes.contains_key("createdAt"));

        let created = payment_codec()
            .encode(&json!({"status": "open"}), Some("user_1"))
            .unwrap();
        assert!(created.creation_attributes.contains_key("createdAt"));
        assert_eq!(created.creation_attributes.get("createdBy"), Some(&json!("user_1")));
    }

    #[rstest]
    fn null_attributes_are_dropped() {
        let encoded = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "note": null}), None)
            .unwrap();
        assert!(!encoded.attributes.contains_key("note"));
    }

    #[rstest]
    fn decode_reverses_encode_modulo_transport_fields() {
        let codec = payment_codec();
        let entity = json!({
            "paymentId": "payment_123",
            "orderId": "order_9",
            "status": "open",
        });
        let encoded = codec.encode(&entity, None).unwrap();

        let mut physical = encoded.attributes.clone();
        for (name, value) in &encoded.creation_attributes {
            physical.insert(name.clone(), value.clone());
        }
        physical.insert("pk".to_string(), Value::String(encoded.pk));
        physical.insert("sk".to_string(), Value::String(encoded.sk));

        let decoded = codec.decode(&Value::Object(physical)).unwrap();
        assert_eq!(decoded.get("paymentId"), Some(&json!("payment_123")));
        assert_eq!(decoded.get("orderId"), Some(&json!("order_9")));
        assert_eq!(decoded.get("status"), Some(&json!("open")));
        assert!(!decoded.contains_key("sk"));
        assert!(!decoded.contains_key(GSI_SK1));
        assert!(!decoded.contains_key(ENTITY_ATTRIBUTE));
    }

    #[rstest]
    fn attachment_without_id_generates_namespaced_id() {
        let codec = method_codec().with_id_generator(|| "01TESTULID".to_string());
        let encoded = codec
            .encode(&json!({"paymentId": "payment_123", "status": "active"}), None)
            .unwrap();
        assert!(encoded.is_new);
        assert_eq!(encoded.pk, "payment_123");
        assert_eq!(
            encoded.sk,
            "payment_method#payment_method_01TESTULID#version_0"
        );
        assert_eq!(
            encoded.attributes.get("paymentMethodId"),
            Some(&json!("payment_method_01TESTULID"))
        );
    }

    #[rstest]
    fn attachment_with_id_is_not_new() {
        let encoded = method_codec()
            .encode(
                &json!({
                    "paymentId": "payment_123",
                    "paymentMethodId": "payment_method_01EXISTING",
                }),
                None,
            )
            .unwrap();
        assert!(!encoded.is_new);
        assert_eq!(
            encoded.sk,
            "payment_method#payment_method_01EXISTING#version_0"
        );
    }

    #[rstest]
    fn empty_version_yields_open_prefix() {
        let encoded = payment_codec()
            .encode(&json!({"paymentId": "payment_123", "version": ""}), None)
            .unwrap();
        assert_eq!(encoded.sk, "payment#version_");
    }
}
