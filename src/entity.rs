//! The orchestrator: composes the codec and the query builder over a store
//! client into get / list / update operations, enforces the
//! optimistic-versioning protocol, and composes root entities with their
//! attachments.

/// Change-event record types.
pub mod stream;

mod version;

use crate::{codec, error, mapping, query, store, validate};
use crate::mapping::{recipe, registry};
use crate::query::cursor;
use crate::store::StoreClient;
use crate::validate::Validator;

use indexmap::IndexMap;
use serde_json::Value;

/// The one data source this engine supports.
const SUPPORTED_DATA_SOURCE: &str = "dynamodb";

/// The wrapper attribute under which a request embeds an attachment
/// payload, keyed by attachment name.
const ATTACHMENT_WRAPPER: &str = "attachment";

/// Pure transform applied to a built query request before dispatch.
pub type QueryTransform = fn(store::QueryRequest) -> store::QueryRequest;

/// Pure transform applied to a built update request before dispatch.
pub type UpdateTransform = fn(store::UpdateRequest) -> store::UpdateRequest;

/// Per-instance configuration of an [`EntityClient`].
///
/// There is no process-wide state: two clients for different entity types
/// over the same table never interact.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalConfig {
    /// For non-root entity types, the logical attribute holding the
    /// generated attachment id. Mandatory when `root_entity` is `false`.
    pub attachment_id_attribute: Option<String>,
    /// The data source name. Only `dynamodb` is supported; anything else
    /// fails construction.
    pub data_source: String,
    /// The entity type name.
    pub entity_name: String,
    /// Overrides the generated-id function. Ids must be unique and
    /// timestamp-sortable; the default is a ULID.
    pub id_generator: Option<fn() -> String>,
    /// Whether this entity type owns its partition key.
    pub root_entity: bool,
    /// The table all items of this entity type live in.
    pub table_name: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            attachment_id_attribute: None,
            data_source: SUPPORTED_DATA_SOURCE.to_string(),
            entity_name: String::new(),
            id_generator: None,
            root_entity: true,
            table_name: String::new(),
        }
    }
}

/// The result of a point lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetResponse {
    /// The decoded attachment, when the request targeted one.
    pub attachment: Option<codec::Item>,
    /// The decoded entity, when the request targeted a root entity.
    pub entity: Option<codec::Item>,
}

/// The result of a version listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VersionsResponse {
    /// The current projection.
    pub entity: Option<codec::Item>,
    /// Opaque cursor to resume the snapshot listing from.
    pub last_evaluated_key: Option<String>,
    /// The historical snapshots, each decoded independently.
    pub versions: Vec<codec::Item>,
}

/// One record of a list result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListedRecord {
    /// The decoded attachment, when the list targeted an attachment type.
    pub attachment: Option<codec::Item>,
    /// The decoded entity; for attachment listings, the owning root entity.
    pub entity: Option<codec::Item>,
}

/// The result of a list operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListResponse {
    /// The matching records.
    pub items: Vec<ListedRecord>,
    /// Opaque cursor to resume from.
    pub last_evaluated_key: Option<String>,
}

/// The result of listing the attachments of one parent entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttachmentsResponse {
    /// The decoded attachments.
    pub attachments: Vec<codec::Item>,
    /// The owning root entity's current projection.
    pub entity: Option<codec::Item>,
    /// Opaque cursor to resume from.
    pub last_evaluated_key: Option<String>,
}

/// The result of an update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResponse {
    /// The updated attachment, when the request embedded one.
    pub attachment: Option<codec::Item>,
    /// The updated entity as returned by the store, decoded. `None` when
    /// the update was skipped because only the secondary sort key moved.
    pub entity: Option<codec::Item>,
}

/// Options for list operations.
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    /// Opaque cursor from a previous page.
    pub exclusive_start_key: Option<String>,
    /// Maximum number of items to evaluate.
    pub limit: Option<i32>,
    /// Pure transform applied to the built query before dispatch.
    pub transform: Option<QueryTransform>,
}

/// Options for version listings.
#[derive(Clone, Debug, Default)]
pub struct VersionOptions {
    /// Opaque cursor from a previous page.
    pub exclusive_start_key: Option<String>,
    /// Maximum number of snapshots to evaluate.
    pub limit: Option<i32>,
}

/// Orchestrator for one entity type over one table.
///
/// ```no_run
/// use dynamodb_mapper::{entity, mapping, store, validate};
/// use serde_json::json;
///
/// # async fn example() -> dynamodb_mapper::Result<()> {
/// let mapping_config: mapping::MappingConfig = mapping::MappingSpec {
///     key_attribute_map: indexmap::indexmap! {
///         mapping::KeyRole::Pk => "paymentId".to_string(),
///         mapping::KeyRole::GsiPk1 => "orderId".to_string(),
///     },
///     sort_key_recipe: vec!["entity".to_string(), "version".to_string()],
///     index_sort_key_recipe: Some(vec!["entity".to_string(), "status".to_string()]),
///     queryable_attributes: Vec::new(),
/// }
/// .try_into()?;
///
/// let client = entity::EntityClient::new(
///     entity::GlobalConfig {
///         entity_name: "payment".to_string(),
///         table_name: "payments".to_string(),
///         ..Default::default()
///     },
///     mapping_config,
///     mapping::registry::AttachmentRegistry::new(),
///     store::memory::MemoryStoreClient::new(),
///     validate::NoValidation,
/// )?;
///
/// let created = client
///     .update(&json!({"status": "open"}), "user_1", None)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EntityClient<S, V = validate::NoValidation> {
    codec: codec::EntityCodec,
    entity_name: String,
    registry: registry::AttachmentRegistry,
    store: S,
    table_name: String,
    validator: V,
}

impl<S: StoreClient, V: Validator> EntityClient<S, V> {
    /// Build a client, validating the configuration.
    ///
    /// Fails with [`UnsupportedDataSource`](error::Error::UnsupportedDataSource)
    /// for any data source other than DynamoDB, and with a mapping error
    /// when a non-root entity type lacks an attachment id attribute. Both
    /// are configuration defects, fatal at construction.
    pub fn new(
        config: GlobalConfig,
        mapping: mapping::MappingConfig,
        registry: registry::AttachmentRegistry,
        store: S,
        validator: V,
    ) -> error::Result<Self> {
        if config.data_source != SUPPORTED_DATA_SOURCE {
            return Err(error::Error::UnsupportedDataSource(config.data_source));
        }
        if !config.root_entity && config.attachment_id_attribute.is_none() {
            return Err(error::Error::Mapping(
                "an attachment id attribute is mandatory for a non-root entity".to_string(),
            ));
        }
        let mut codec = match (config.root_entity, config.attachment_id_attribute) {
            (true, _) => codec::EntityCodec::new(config.entity_name.clone(), mapping),
            (false, Some(id_attribute)) => {
                codec::EntityCodec::for_sub_entity(config.entity_name.clone(), mapping, id_attribute)
            }
            (false, None) => unreachable!("checked above"),
        };
        if let Some(id_generator) = config.id_generator {
            codec = codec.with_id_generator(id_generator);
        }
        Ok(Self {
            codec,
            entity_name: config.entity_name,
            registry,
            store,
            table_name: config.table_name,
            validator,
        })
    }

    /// Point lookup of an entity, an attachment, or a specific historical
    /// version.
    ///
    /// With no `version` (or version `0`), the current projection is
    /// returned; with a snapshot version token, the lookup is redirected
    /// into the historical range.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get", skip(self), err)
    )]
    pub async fn get(&self, entity: &Value) -> error::Result<GetResponse> {
        let entity = self.validator.validate(validate::Operation::Get, entity)?;
        let (target, codec, attachment_name) = self.resolve_target(&entity)?;
        let requests_current = match target.get(recipe::VERSION_ATTRIBUTE) {
            None | Some(Value::Null) => true,
            Some(Value::Number(number)) => number.as_i64() == Some(0),
            Some(_) => false,
        };
        let encoded = codec.encode(&Value::Object(target), None)?;
        let sk = if requests_current {
            encoded.sk
        } else {
            version::versioned_sort_key(&encoded.sk, codec.entity_name())
        };
        let item = self.store.get_item(&self.table_name, &encoded.pk, &sk).await?;
        let decoded = item
            .map(|item| codec.decode(&Value::Object(item)))
            .transpose()?;
        Ok(match attachment_name {
            Some(_) => GetResponse {
                attachment: decoded,
                entity: None,
            },
            None => GetResponse {
                attachment: None,
                entity: decoded,
            },
        })
    }

    /// Fetch the current projection and a page of historical snapshots.
    ///
    /// The point lookup and the snapshot-range query are independent and
    /// issued concurrently, then joined before returning.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_with_versions", skip(self), err)
    )]
    pub async fn get_with_versions(
        &self,
        entity: &Value,
        options: VersionOptions,
    ) -> error::Result<VersionsResponse> {
        let entity = self.validator.validate(validate::Operation::Get, entity)?;
        let (mut target, codec, _) = self.resolve_target(&entity)?;
        // An empty version value closes the sort key right after the
        // version prefix: the resulting `{entity}#version_` serves as the
        // begins_with prefix for the whole snapshot range.
        target.insert(
            recipe::VERSION_ATTRIBUTE.to_string(),
            Value::String(String::new()),
        );
        let encoded = codec.encode(&Value::Object(target), None)?;
        let snapshot_prefix = version::versioned_sort_key(&encoded.sk, codec.entity_name());
        let current_sk = format!("{}0", encoded.sk);
        let exclusive_start_key = options
            .exclusive_start_key
            .as_deref()
            .map(cursor::decode)
            .transpose()?;

        let snapshot_query = store::QueryRequest {
            exclusive_start_key,
            filters: IndexMap::new(),
            index_name: None,
            key_condition: store::KeyCondition {
                name: mapping::KeyRole::Pk.to_string(),
                sort_key: Some(store::SortKeyPrefix {
                    name: "sk".to_string(),
                    prefix: snapshot_prefix,
                }),
                value: Value::String(encoded.pk.clone()),
            },
            limit: options.limit,
            table_name: self.table_name.clone(),
        };
        let (snapshots, current) = futures::join!(
            self.store.query(snapshot_query),
            self.store.get_item(&self.table_name, &encoded.pk, &current_sk),
        );
        let snapshots = snapshots?;
        let entity = current?
            .map(|item| codec.decode(&Value::Object(item)))
            .transpose()?;
        let versions = snapshots
            .items
            .into_iter()
            .map(|item| codec.decode(&Value::Object(item)))
            .collect::<error::Result<Vec<_>>>()?;
        Ok(VersionsResponse {
            entity,
            last_evaluated_key: snapshots.last_evaluated_key.as_ref().map(cursor::encode),
            versions,
        })
    }

    /// List entities matching a partial filter specification.
    ///
    /// When the filter targets an attachment type, the owning root entity
    /// is resolved and attached to each result.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.list", skip(self), err)
    )]
    pub async fn list(&self, entity: &Value, options: ListOptions) -> error::Result<ListResponse> {
        let entity = self.validator.validate(validate::Operation::List, entity)?;
        let (target, codec, attachment_name) = self.resolve_target(&entity)?;
        let encoded = codec.encode(&Value::Object(target), None)?;
        let exclusive_start_key = options
            .exclusive_start_key
            .as_deref()
            .map(cursor::decode)
            .transpose()?;
        let mut request = query::build_list_query(
            &encoded,
            query::ListQueryArgs {
                entity_name: codec.entity_name(),
                exclusive_start_key,
                limit: options.limit,
                table_name: &self.table_name,
            },
        )?;
        if let Some(transform) = options.transform {
            request = transform(request);
        }
        let response = self.store.query(request).await?;

        let mut items = Vec::with_capacity(response.items.len());
        for item in response.items {
            if attachment_name.is_some() {
                let owner = match item.get(&*mapping::KeyRole::Pk).and_then(Value::as_str) {
                    Some(pk) => self.current_projection(pk).await?,
                    None => None,
                };
                items.push(ListedRecord {
                    attachment: Some(codec.decode(&Value::Object(item))?),
                    entity: owner,
                });
            } else {
                items.push(ListedRecord {
                    attachment: None,
                    entity: Some(codec.decode(&Value::Object(item))?),
                });
            }
        }
        Ok(ListResponse {
            items,
            last_evaluated_key: response.last_evaluated_key.as_ref().map(cursor::encode),
        })
    }

    /// List all attachments of one type under a parent entity.
    ///
    /// Served by a parent-scoped secondary-index query: the attachments
    /// share the parent's partition key, and their index sort keys are
    /// namespaced under the attachment entity prefix.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.list_attachments", skip(self), err)
    )]
    pub async fn list_attachments(
        &self,
        parent_pk: &str,
        attachment_name: &str,
        filter: &Value,
        options: ListOptions,
    ) -> error::Result<AttachmentsResponse> {
        let config = self.registry.get(attachment_name)?;
        let codec = codec::EntityCodec::for_attachment(&self.entity_name, config);
        let encoded = codec.encode(filter, None)?;
        let Some(Value::String(gsi_sk1)) = encoded.attributes.get(codec::GSI_SK1) else {
            return Err(error::Error::Mapping(
                "listing attachments requires an index sort key recipe".to_string(),
            ));
        };
        let prefix = recipe::trim_trailing_separator(gsi_sk1).to_string();
        let exclusive_start_key = options
            .exclusive_start_key
            .as_deref()
            .map(cursor::decode)
            .transpose()?;

        let mut request = store::QueryRequest {
            exclusive_start_key,
            filters: IndexMap::new(),
            index_name: Some(format!("{}-{}", &*mapping::KeyRole::Pk, codec::GSI_SK1)),
            key_condition: store::KeyCondition {
                name: mapping::KeyRole::Pk.to_string(),
                sort_key: Some(store::SortKeyPrefix {
                    name: codec::GSI_SK1.to_string(),
                    prefix,
                }),
                value: Value::String(parent_pk.to_string()),
            },
            limit: options.limit,
            table_name: self.table_name.clone(),
        };
        if let Some(transform) = options.transform {
            request = transform(request);
        }

        let (response, owner) = futures::join!(
            self.store.query(request),
            self.current_projection(parent_pk),
        );
        let response = response?;
        let attachments = response
            .items
            .into_iter()
            .map(|item| codec.decode(&Value::Object(item)))
            .collect::<error::Result<Vec<_>>>()?;
        Ok(AttachmentsResponse {
            attachments,
            entity: owner?,
            last_evaluated_key: response.last_evaluated_key.as_ref().map(cursor::encode),
        })
    }

    /// Create or mutate an entity, enforcing the optimistic-concurrency
    /// guard and recomputing composite index keys.
    ///
    /// The conditional write asserts non-existence when creating and
    /// existence when updating; attachments skip the existence assertion,
    /// since their existence cannot be known in advance. An embedded
    /// `attachment` payload is updated under the same partition key and
    /// composed into the response.
    ///
    /// Validators are invoked with [`Operation::Update`](validate::Operation);
    /// implementations backed by separate create/update schemas should
    /// accept either shape, the way request alternatives do.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update", skip(self), err)
    )]
    pub async fn update(
        &self,
        entity: &Value,
        executor_id: &str,
        transform: Option<UpdateTransform>,
    ) -> error::Result<UpdateResponse> {
        let entity = self.validator.validate(validate::Operation::Update, entity)?;
        let Some(object) = entity.as_object() else {
            return Err(error::Error::MalformedEntity);
        };
        let mut object = object.clone();
        let embedded = object.remove(ATTACHMENT_WRAPPER);
        let encoded = self.codec.encode(&Value::Object(object), Some(executor_id))?;

        let attachment = match embedded {
            Some(wrapper) => {
                let (name, mut payload) = unwrap_attachment(&wrapper)?;
                let config = self.registry.get(&name)?;
                let attachment_codec = codec::EntityCodec::for_attachment(&self.entity_name, config);
                payload.insert(
                    mapping::KeyRole::Pk.to_string(),
                    Value::String(encoded.pk.clone()),
                );
                let attachment_encoded =
                    attachment_codec.encode(&Value::Object(payload), Some(executor_id))?;
                self.apply_update(&attachment_codec, attachment_encoded, transform)
                    .await?
            }
            None => None,
        };
        let entity = self.apply_update(&self.codec, encoded, transform).await?;
        Ok(UpdateResponse { attachment, entity })
    }

    /// Decode a change-event record into logical old/new entities.
    pub fn unpack_change_event(
        &self,
        record: stream::ChangeRecord,
    ) -> error::Result<stream::UnpackedChangeEvent> {
        let old_entity = record
            .old_image
            .as_ref()
            .map(|image| self.codec.decode(&Value::Object(image.clone())))
            .transpose()?;
        let new_entity = record
            .new_image
            .as_ref()
            .map(|image| self.codec.decode(&Value::Object(image.clone())))
            .transpose()?;
        Ok(stream::UnpackedChangeEvent {
            event_type: record.event_type,
            new_entity,
            old_entity,
            raw_new_image: record.new_image,
            raw_old_image: record.old_image,
        })
    }

    /// Write the historical snapshot for a freshly mutated current
    /// projection, or skip when the image must not be snapshotted.
    ///
    /// Feed this the raw new image from
    /// [`unpack_change_event`](Self::unpack_change_event): images that are
    /// themselves snapshots are refused, so re-processing the write of a
    /// snapshot never snowballs into a snapshot-of-snapshot loop.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.write_snapshot", skip_all, err)
    )]
    pub async fn write_snapshot(
        &self,
        new_image: &codec::Item,
    ) -> error::Result<Option<codec::Item>> {
        let token = ulid::Ulid::new().to_string();
        let Some(snapshot) = version::build_snapshot(new_image, &token) else {
            return Ok(None);
        };
        self.store
            .put_item(&self.table_name, snapshot.clone())
            .await?;
        Ok(Some(snapshot))
    }

    /// The store client this orchestrator writes through.
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn apply_update(
        &self,
        codec: &codec::EntityCodec,
        mut encoded: codec::EncodedEntity,
        transform: Option<UpdateTransform>,
    ) -> error::Result<Option<codec::Item>> {
        let is_attachment = codec.is_attachment();
        // An existing item whose only mutated attribute is the secondary
        // sort key did not actually move in any index: skip the write. The
        // audit stamps don't count as mutations here.
        let mutated = encoded
            .attributes
            .keys()
            .filter(|name| !matches!(name.as_str(), "updatedAt" | "updatedBy"))
            .collect::<Vec<_>>();
        if !encoded.is_new && mutated.len() == 1 && mutated[0].as_str() == codec::GSI_SK1 {
            return Ok(None);
        }
        self.complete_index_sort_key(&mut encoded, is_attachment).await?;

        let mut set = codec::Item::new();
        let mut remove = Vec::new();
        for (name, value) in &encoded.attributes {
            if value.as_str() == Some("") {
                remove.push(name.clone());
            } else {
                set.insert(name.clone(), value.clone());
            }
        }
        if encoded.is_new || is_attachment {
            for (name, value) in &encoded.creation_attributes {
                set.insert(name.clone(), value.clone());
            }
        }
        let guard = if encoded.is_new {
            store::ExistenceGuard::MustNotExist
        } else if is_attachment {
            store::ExistenceGuard::Unguarded
        } else {
            store::ExistenceGuard::MustExist
        };

        let mut request = store::UpdateRequest {
            add: indexmap::indexmap! { version::LATEST_VERSION.to_string() => 1 },
            guard,
            pk: encoded.pk,
            remove,
            set,
            sk: encoded.sk,
            table_name: self.table_name.clone(),
        };
        if let Some(transform) = transform {
            request = transform(request);
        }
        let updated = self.store.conditional_update(request).await?;
        Ok(Some(codec.decode(&Value::Object(updated))?))
    }

    /// Make a partially satisfied secondary sort key safe to write.
    ///
    /// When none of the recipe's attributes are being written, the key is
    /// simply not rewritten. Otherwise, for an existing root entity, the
    /// missing recipe components are backfilled from the stored item so a
    /// partial update cannot corrupt the composite key. Attachments never
    /// use the backfill path: their recipe must be satisfiable from the
    /// write itself.
    async fn complete_index_sort_key(
        &self,
        encoded: &mut codec::EncodedEntity,
        is_attachment: bool,
    ) -> error::Result<()> {
        let Some(gsi_recipe) = encoded.recipes.gsi_sk1.clone() else {
            return Ok(());
        };
        if encoded.gsi_sk1_contains.len() >= gsi_recipe.len() {
            return Ok(());
        }

        let mut should_update = encoded.is_new;
        for logical in &gsi_recipe {
            let physical = encoded.used_key_map.to_physical(logical).unwrap_or(logical);
            if encoded.attributes.contains_key(physical) {
                should_update = true;
            }
        }
        if !should_update || (is_attachment && !encoded.is_new) {
            encoded.attributes.remove(codec::GSI_SK1);
            return Ok(());
        }

        if !encoded.is_new
            && let Some(stored) = self
                .store
                .get_item(&self.table_name, &encoded.pk, &encoded.sk)
                .await?
        {
            let mut value = encoded
                .attributes
                .get(codec::GSI_SK1)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            for missing in &encoded.gsi_sk1_misses {
                let component = encoded
                    .attributes
                    .get(missing)
                    .or_else(|| stored.get(missing));
                match component {
                    Some(present) if !present.is_null() => {
                        value.push_str(&recipe::render_segment(missing, present)?);
                        value.push_str(recipe::KEY_SEPARATOR);
                    }
                    _ => break,
                }
            }
            encoded
                .attributes
                .insert(codec::GSI_SK1.to_string(), Value::String(value));
        }

        let trimmed = match encoded.attributes.get(codec::GSI_SK1) {
            Some(Value::String(value)) => {
                Some(recipe::trim_trailing_separator(value).to_string())
            }
            _ => None,
        };
        if let Some(trimmed) = trimmed {
            encoded
                .attributes
                .insert(codec::GSI_SK1.to_string(), Value::String(trimmed));
        }
        Ok(())
    }

    async fn current_projection(&self, pk: &str) -> error::Result<Option<codec::Item>> {
        let mut root = codec::Item::new();
        root.insert(
            mapping::KeyRole::Pk.to_string(),
            Value::String(pk.to_string()),
        );
        root.insert(recipe::VERSION_ATTRIBUTE.to_string(), Value::from(0));
        let encoded = self.codec.encode(&Value::Object(root), None)?;
        let item = self
            .store
            .get_item(&self.table_name, &encoded.pk, &encoded.sk)
            .await?;
        item.map(|item| self.codec.decode(&Value::Object(item)))
            .transpose()
    }

    fn resolve_target(
        &self,
        entity: &Value,
    ) -> error::Result<(codec::Item, codec::EntityCodec, Option<String>)> {
        let Some(object) = entity.as_object() else {
            return Err(error::Error::MalformedEntity);
        };
        let mut object = object.clone();
        match object.remove(ATTACHMENT_WRAPPER) {
            Some(wrapper) => {
                let (name, payload) = unwrap_attachment(&wrapper)?;
                let config = self.registry.get(&name)?;
                let codec = codec::EntityCodec::for_attachment(&self.entity_name, config);
                for (attribute, value) in payload {
                    object.insert(attribute, value);
                }
                Ok((object, codec, Some(name)))
            }
            None => Ok((object, self.codec.clone(), None)),
        }
    }
}

/// Split an `attachment` wrapper into its name and payload.
fn unwrap_attachment(wrapper: &Value) -> error::Result<(String, codec::Item)> {
    let Some(wrapper) = wrapper.as_object() else {
        return Err(error::Error::MalformedEntity);
    };
    let Some((name, payload)) = wrapper.iter().next() else {
        return Err(error::Error::MalformedEntity);
    };
    let Some(payload) = payload.as_object() else {
        return Err(error::Error::MalformedEntity);
    };
    Ok((name.clone(), payload.clone()))
}
