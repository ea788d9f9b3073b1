//! End-to-end coverage of the orchestrator over the in-memory store:
//! create/update lifecycle, optimistic concurrency, version snapshots,
//! listing with index selection and pagination, and attachment
//! composition.

use dynamodb_mapper::entity::{EntityClient, GlobalConfig, ListOptions, VersionOptions};
use dynamodb_mapper::entity::stream::{ChangeEventType, ChangeRecord};
use dynamodb_mapper::mapping::registry::{AttachmentConfig, AttachmentRegistry};
use dynamodb_mapper::mapping::{KeyRole, MappingConfig, MappingSpec};
use dynamodb_mapper::store::memory::MemoryStoreClient;
use dynamodb_mapper::validate::NoValidation;
use dynamodb_mapper::{Error, Item, diff};

use serde_json::{Value, json};

const TABLE: &str = "payments";

fn payment_mapping() -> MappingConfig {
    MappingSpec {
        key_attribute_map: [
            (KeyRole::Pk, "paymentId".to_string()),
            (KeyRole::GsiPk1, "orderId".to_string()),
            (KeyRole::GsiPk2, "productId".to_string()),
        ]
        .into_iter()
        .collect(),
        sort_key_recipe: vec!["entity".to_string(), "version".to_string()],
        index_sort_key_recipe: Some(vec![
            "entity".to_string(),
            "productId".to_string(),
            "status".to_string(),
        ]),
        queryable_attributes: Vec::new(),
    }
    .try_into()
    .expect("valid payment mapping")
}

fn method_registry() -> AttachmentRegistry {
    let mapping: MappingConfig = MappingSpec {
        key_attribute_map: [(KeyRole::Pk, "paymentId".to_string())].into_iter().collect(),
        sort_key_recipe: vec![
            "entity".to_string(),
            "paymentMethodId".to_string(),
            "version".to_string(),
        ],
        index_sort_key_recipe: Some(vec!["entity".to_string(), "status".to_string()]),
        queryable_attributes: Vec::new(),
    }
    .try_into()
    .expect("valid method mapping");
    let mut registry = AttachmentRegistry::new();
    registry.insert(
        "method",
        AttachmentConfig {
            entity_name: "method".to_string(),
            id_attribute: "paymentMethodId".to_string(),
            mapping,
        },
    );
    registry
}

fn payment_client() -> EntityClient<MemoryStoreClient> {
    EntityClient::new(
        GlobalConfig {
            entity_name: "payment".to_string(),
            table_name: TABLE.to_string(),
            ..Default::default()
        },
        payment_mapping(),
        method_registry(),
        MemoryStoreClient::new(),
        NoValidation,
    )
    .expect("valid configuration")
}

fn fixed_id() -> String {
    "01HFIXEDID".to_string()
}

fn payment_id(entity: &Item) -> String {
    entity
        .get("paymentId")
        .and_then(Value::as_str)
        .expect("decoded entity carries its id")
        .to_string()
}

fn raw_current(store: &MemoryStoreClient, pk: &str) -> Item {
    store
        .items(TABLE)
        .into_iter()
        .find(|item| {
            item.get("pk").and_then(Value::as_str) == Some(pk)
                && item.get("sk").and_then(Value::as_str) == Some("payment#version_0")
        })
        .expect("current projection exists")
}

fn snapshot_count(store: &MemoryStoreClient) -> usize {
    store
        .items(TABLE)
        .iter()
        .filter(|item| {
            item.get("sk")
                .and_then(Value::as_str)
                .is_some_and(|sk| sk.starts_with("paymentVersion#"))
        })
        .count()
}

#[tokio::test]
async fn create_then_read_back() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open", "productId": "prod_1"}), "user_1", None)
        .await
        .unwrap();
    let entity = created.entity.expect("create returns the new entity");
    assert!(payment_id(&entity).starts_with("payment_"));
    assert_eq!(entity.get("status"), Some(&json!("open")));
    assert_eq!(entity.get("latestVersion"), Some(&json!(1)));
    assert_eq!(entity.get("createdBy"), Some(&json!("user_1")));

    let fetched = client
        .get(&json!({"paymentId": payment_id(&entity)}))
        .await
        .unwrap();
    let fetched = fetched.entity.expect("entity exists");
    assert_eq!(fetched.get("status"), Some(&json!("open")));
    assert_eq!(fetched.get("productId"), Some(&json!("prod_1")));
    assert!(!fetched.contains_key("sk"));
    assert!(!fetched.contains_key("entity"));
}

#[tokio::test]
async fn update_existing_increments_the_mutation_counter() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());

    let updated = client
        .update(&json!({"paymentId": id, "status": "paid"}), "user_2", None)
        .await
        .unwrap();
    let entity = updated.entity.unwrap();
    assert_eq!(entity.get("status"), Some(&json!("paid")));
    assert_eq!(entity.get("latestVersion"), Some(&json!(2)));
    assert_eq!(entity.get("updatedBy"), Some(&json!("user_2")));
    assert_eq!(entity.get("createdBy"), Some(&json!("user_1")));
}

#[tokio::test]
async fn concurrent_creates_let_exactly_one_writer_win() {
    let client = EntityClient::new(
        GlobalConfig {
            entity_name: "payment".to_string(),
            id_generator: Some(fixed_id),
            table_name: TABLE.to_string(),
            ..Default::default()
        },
        payment_mapping(),
        AttachmentRegistry::new(),
        MemoryStoreClient::new(),
        NoValidation,
    )
    .unwrap();

    let first_patch = json!({"status": "open"});
    let second_patch = json!({"status": "open"});
    let (first, second) = tokio::join!(
        client.update(&first_patch, "user_1", None),
        client.update(&second_patch, "user_2", None),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(Error::ConditionFailed { .. })))
    );
}

#[tokio::test]
async fn updating_a_missing_entity_is_a_conflict() {
    let client = payment_client();
    let result = client
        .update(
            &json!({"paymentId": "payment_missing", "status": "paid"}),
            "user_1",
            None,
        )
        .await;
    assert!(matches!(result, Err(Error::ConditionFailed { .. })));
}

#[tokio::test]
async fn update_with_no_real_mutation_is_skipped() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open", "productId": "prod_1"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());

    // Only the key is supplied: the encoded write would touch nothing but
    // the derived secondary sort key, so the engine refuses to write.
    let skipped = client.update(&json!({"paymentId": id}), "user_2", None).await.unwrap();
    assert!(skipped.entity.is_none());

    let raw = raw_current(client.store(), &id);
    assert_eq!(raw.get("latestVersion"), Some(&json!(1)));
    assert_eq!(raw.get("updatedBy"), Some(&json!("user_1")));
}

#[tokio::test]
async fn partial_update_backfills_the_composite_index_key() {
    let client = payment_client();
    let created = client
        .update(
            &json!({"productId": "prod_1", "status": "open"}),
            "user_1",
            None,
        )
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());
    assert_eq!(
        raw_current(client.store(), &id).get("gsiSk1"),
        Some(&json!("payment#prod_1#open"))
    );

    // status alone cannot rebuild the composite key; productId must come
    // from the stored item.
    client
        .update(&json!({"paymentId": id, "status": "paid"}), "user_1", None)
        .await
        .unwrap();
    assert_eq!(
        raw_current(client.store(), &id).get("gsiSk1"),
        Some(&json!("payment#prod_1#paid"))
    );
}

#[tokio::test]
async fn empty_string_attributes_are_removed() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open", "note": "gift"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());

    let updated = client
        .update(&json!({"paymentId": id, "note": ""}), "user_1", None)
        .await
        .unwrap();
    assert!(!updated.entity.unwrap().contains_key("note"));
}

#[tokio::test]
async fn listing_selects_the_highest_priority_index() {
    let client = payment_client();
    client
        .update(
            &json!({"orderId": "order_1", "productId": "prod_1", "status": "open"}),
            "user_1",
            None,
        )
        .await
        .unwrap();
    client
        .update(
            &json!({"orderId": "order_2", "productId": "prod_2", "status": "open"}),
            "user_1",
            None,
        )
        .await
        .unwrap();

    let by_order = client
        .list(&json!({"orderId": "order_1"}), ListOptions::default())
        .await
        .unwrap();
    assert_eq!(by_order.items.len(), 1);
    let entity = by_order.items[0].entity.as_ref().unwrap();
    assert_eq!(entity.get("orderId"), Some(&json!("order_1")));

    // No key attribute known: the entity-type fallback scans the whole
    // type, and the unconsumed attribute becomes a post-filter.
    let by_status = client
        .list(&json!({"status": "open"}), ListOptions::default())
        .await
        .unwrap();
    assert_eq!(by_status.items.len(), 2);
}

#[tokio::test]
async fn listing_paginates_through_opaque_cursors() {
    let client = payment_client();
    for product in ["prod_1", "prod_2", "prod_3"] {
        client
            .update(
                &json!({"productId": product, "status": "open"}),
                "user_1",
                None,
            )
            .await
            .unwrap();
    }

    let first_page = client
        .list(
            &json!({}),
            ListOptions {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_page.items.len(), 2);
    let cursor = first_page.last_evaluated_key.expect("more pages remain");

    let second_page = client
        .list(
            &json!({}),
            ListOptions {
                exclusive_start_key: Some(cursor),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second_page.items.len(), 1);
    assert!(second_page.last_evaluated_key.is_none());
}

#[tokio::test]
async fn snapshots_accumulate_and_never_cascade() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());

    let snapshot = client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap()
        .expect("current projections are snapshotted");
    assert_eq!(snapshot_count(client.store()), 1);
    assert_eq!(snapshot.get("versionNumber"), Some(&json!(1)));

    // Re-processing the snapshot's own write must not snowball.
    let refused = client.write_snapshot(&snapshot).await.unwrap();
    assert!(refused.is_none());
    assert_eq!(snapshot_count(client.store()), 1);

    client
        .update(&json!({"paymentId": id, "status": "paid"}), "user_1", None)
        .await
        .unwrap();
    client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap()
        .expect("second mutation snapshotted");
    assert_eq!(snapshot_count(client.store()), 2);
}

#[tokio::test]
async fn version_listing_joins_current_and_history() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());
    client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap();
    client
        .update(&json!({"paymentId": id, "status": "paid"}), "user_1", None)
        .await
        .unwrap();
    client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap();

    let listed = client
        .get_with_versions(&json!({"paymentId": id}), VersionOptions::default())
        .await
        .unwrap();
    let entity = listed.entity.expect("current projection present");
    assert_eq!(entity.get("status"), Some(&json!("paid")));
    assert_eq!(listed.versions.len(), 2);
    for version in &listed.versions {
        assert!(version.get("version").is_some_and(Value::is_string));
        assert!(version.get("versionNumber").is_some());
        assert!(!version.contains_key("sk"));
    }

    // A snapshot token in the key spec redirects the point lookup into the
    // historical range.
    let first_token = listed.versions[0].get("version").cloned().unwrap();
    let historical = client
        .get(&json!({"paymentId": id, "version": first_token}))
        .await
        .unwrap();
    assert_eq!(
        historical.entity.expect("snapshot found").get("status"),
        Some(&json!("open"))
    );

    let paged = client
        .get_with_versions(
            &json!({"paymentId": id}),
            VersionOptions {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paged.versions.len(), 1);
    let cursor = paged.last_evaluated_key.expect("one snapshot remains");

    let rest = client
        .get_with_versions(
            &json!({"paymentId": id}),
            VersionOptions {
                exclusive_start_key: Some(cursor),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(rest.versions.len(), 1);
    assert_ne!(
        paged.versions[0].get("version"),
        rest.versions[0].get("version")
    );
}

#[tokio::test]
async fn version_chain_carries_changes_against_the_predecessor() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());
    client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap();
    client
        .update(&json!({"paymentId": id, "status": "paid"}), "user_1", None)
        .await
        .unwrap();
    client
        .write_snapshot(&raw_current(client.store(), &id))
        .await
        .unwrap();

    let listed = client
        .get_with_versions(&json!({"paymentId": id}), VersionOptions::default())
        .await
        .unwrap();
    let mut versions = listed.versions;
    versions.push(listed.entity.unwrap());
    let chain = diff::compare_version_chain(versions, &diff::DiffOptions::default());

    assert_eq!(chain.len(), 3);
    assert!(!chain[0].contains_key("changesToPreviousVersion"));
    assert_eq!(
        chain[1].get("changesToPreviousVersion"),
        Some(&json!({"status": {"oldValue": "open", "newValue": "paid"}}))
    );
    // The current projection matches the latest snapshot: empty diff.
    assert_eq!(
        chain[2].get("changesToPreviousVersion"),
        Some(&json!({}))
    );
}

#[tokio::test]
async fn embedded_attachment_updates_under_the_parent_partition() {
    let client = payment_client();
    let response = client
        .update(
            &json!({
                "status": "open",
                "attachment": {
                    "method": {"status": "active", "holder": "Jane"}
                }
            }),
            "user_1",
            None,
        )
        .await
        .unwrap();
    let entity = response.entity.expect("root entity written");
    let attachment = response.attachment.expect("attachment written");
    let method_id = attachment
        .get("paymentMethodId")
        .and_then(Value::as_str)
        .expect("attachment id generated")
        .to_string();
    assert!(method_id.starts_with("payment_method_"));
    assert_eq!(attachment.get("holder"), Some(&json!("Jane")));

    let id = payment_id(&entity);
    let listed = client
        .list_attachments(&id, "method", &json!({}), ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed.attachments.len(), 1);
    assert_eq!(
        listed.attachments[0].get("paymentMethodId"),
        Some(&json!(method_id.clone()))
    );
    let owner = listed.entity.expect("owner resolved");
    assert_eq!(owner.get("status"), Some(&json!("open")));

    let fetched = client
        .get(&json!({
            "paymentId": id,
            "attachment": {"method": {"paymentMethodId": method_id}}
        }))
        .await
        .unwrap();
    assert!(fetched.entity.is_none());
    let fetched = fetched.attachment.expect("attachment found");
    assert_eq!(fetched.get("holder"), Some(&json!("Jane")));
}

#[tokio::test]
async fn listing_an_attachment_type_resolves_the_owner() {
    let client = payment_client();
    client
        .update(
            &json!({
                "status": "open",
                "attachment": {
                    "method": {"status": "active", "holder": "Jane"}
                }
            }),
            "user_1",
            None,
        )
        .await
        .unwrap();

    let listed = client
        .list(
            &json!({"attachment": {"method": {"status": "active"}}}),
            ListOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    let record = &listed.items[0];
    let attachment = record.attachment.as_ref().expect("attachment decoded");
    assert_eq!(attachment.get("holder"), Some(&json!("Jane")));
    let owner = record.entity.as_ref().expect("owner resolved");
    assert_eq!(owner.get("status"), Some(&json!("open")));
}

#[tokio::test]
async fn change_events_unpack_to_logical_entities() {
    let client = payment_client();
    let created = client
        .update(&json!({"status": "open"}), "user_1", None)
        .await
        .unwrap();
    let id = payment_id(&created.entity.unwrap());
    let raw = raw_current(client.store(), &id);

    let unpacked = client
        .unpack_change_event(ChangeRecord {
            event_type: ChangeEventType::Modify,
            new_image: Some(raw.clone()),
            old_image: None,
        })
        .unwrap();
    assert_eq!(unpacked.event_type, ChangeEventType::Modify);
    let new_entity = unpacked.new_entity.expect("new image decoded");
    assert_eq!(new_entity.get("paymentId"), Some(&json!(id)));
    assert!(!new_entity.contains_key("sk"));
    assert_eq!(unpacked.raw_new_image, Some(raw));
}

#[tokio::test]
async fn configuration_defects_fail_at_construction() {
    let unsupported = EntityClient::new(
        GlobalConfig {
            data_source: "postgres".to_string(),
            entity_name: "payment".to_string(),
            table_name: TABLE.to_string(),
            ..Default::default()
        },
        payment_mapping(),
        AttachmentRegistry::new(),
        MemoryStoreClient::new(),
        NoValidation,
    );
    assert!(matches!(
        unsupported,
        Err(Error::UnsupportedDataSource(source)) if source == "postgres"
    ));

    let non_root = EntityClient::new(
        GlobalConfig {
            entity_name: "method".to_string(),
            root_entity: false,
            table_name: TABLE.to_string(),
            ..Default::default()
        },
        payment_mapping(),
        AttachmentRegistry::new(),
        MemoryStoreClient::new(),
        NoValidation,
    );
    assert!(matches!(non_root, Err(Error::Mapping(_))));
}

#[tokio::test]
async fn unknown_attachment_names_are_configuration_defects() {
    let client = payment_client();
    let result = client
        .update(
            &json!({
                "status": "open",
                "attachment": {"receipt": {"total": 10}}
            }),
            "user_1",
            None,
        )
        .await;
    assert!(matches!(
        result,
        Err(Error::ResourceNotFound(name)) if name == "receipt"
    ));
}
