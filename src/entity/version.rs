use crate::codec;
use crate::mapping::recipe;

use serde_json::Value;

/// Suffix appended to the entity segment of a sort key to move an item into
/// the historical-snapshot range.
///
/// Current projections and snapshots share a partition; the rewritten
/// entity segment keeps the two ranges from ever interleaving in a prefix
/// scan.
const VERSION_ENTITY_SUFFIX: &str = "Version";

/// The attribute counting successful mutations of a current projection.
pub(crate) const LATEST_VERSION: &str = "latestVersion";

/// The attribute on a snapshot recording which mutation it captured.
const VERSION_NUMBER: &str = "versionNumber";

/// Rewrite the entity segment of a sort key into the snapshot range.
pub(crate) fn versioned_sort_key(sk: &str, entity_name: &str) -> String {
    sk.replacen(entity_name, &format!("{entity_name}{VERSION_ENTITY_SUFFIX}"), 1)
}

/// Build the immutable historical-snapshot item for a freshly written
/// current projection, or `None` when the image must not be snapshotted.
///
/// The guard: an image without a positive `latestVersion` is either a
/// snapshot itself or was never written through the versioned update path.
/// Skipping it prevents an infinite snapshot-of-snapshot loop when change
/// notifications are re-processed by the same pipeline that writes them.
pub(crate) fn build_snapshot(new_image: &codec::Item, version_token: &str) -> Option<codec::Item> {
    let latest_version = new_image.get(LATEST_VERSION).and_then(Value::as_i64).unwrap_or(0);
    if latest_version == 0 {
        return None;
    }
    let entity_name = new_image.get(codec::ENTITY_ATTRIBUTE)?.as_str()?.to_string();

    let mut snapshot = codec::Item::new();
    for (name, value) in new_image {
        if matches!(
            name.as_str(),
            "createdAt" | "createdBy" | LATEST_VERSION | codec::ENTITY_ATTRIBUTE | codec::GSI_SK1
        ) {
            continue;
        }
        snapshot.insert(name.clone(), value.clone());
    }

    snapshot.insert(
        recipe::VERSION_ATTRIBUTE.to_string(),
        Value::String(version_token.to_string()),
    );
    snapshot.insert(VERSION_NUMBER.to_string(), Value::from(latest_version));

    let sk = snapshot.get("sk")?.as_str()?.to_string();
    let sk = sk.replacen(
        &format!("{}{}0", recipe::KEY_SEPARATOR, recipe::VERSION_PREFIX),
        &format!("{}{}{version_token}", recipe::KEY_SEPARATOR, recipe::VERSION_PREFIX),
        1,
    );
    let sk = versioned_sort_key(&sk, &entity_name);
    snapshot.insert("sk".to_string(), Value::String(sk));

    Some(snapshot)
}
