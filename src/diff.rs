//! Generic structural comparison of logical entities.
//!
//! Produces, per attribute path, the old and new values of everything that
//! differs, with configurable attribute exclusion and inclusion, per-array
//! ordered/unordered policies, and keyed reconciliation of arrays of
//! objects. [`compare_version_chain`] applies the comparator across a
//! version listing, attaching each version's changes against its immediate
//! predecessor; this is what powers audit and history views without
//! storing explicit diffs.

use crate::codec;
use crate::mapping::recipe;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections;

/// Attributes excluded from comparison by default: audit metadata and
/// version bookkeeping.
pub const DEFAULT_EXCLUDED_ATTRIBUTES: [&str; 7] = [
    "createdAt",
    "createdBy",
    "updatedAt",
    "updatedBy",
    "version",
    "versionNumber",
    "latestVersion",
];

/// The attribute attached to each version carrying its diff against the
/// previous one.
const CHANGES_ATTRIBUTE: &str = "changesToPreviousVersion";

/// How an array attribute is compared.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ArrayPolicy {
    /// Arrays of objects: reconcile by the value under this comparison
    /// key, bucketing into new, deleted and comparable items.
    KeyedBy(String),
    /// Positional comparison; any reordering is a change.
    Ordered,
    /// Membership comparison; reordering is not a change.
    Unordered,
}

/// Options controlling a comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffOptions {
    /// Per-array-attribute comparison policy. Arrays without a policy are
    /// compared positionally.
    pub array_policies: IndexMap<String, ArrayPolicy>,
    /// Attribute names skipped at any depth.
    pub excluded_attributes: Vec<String>,
    /// When set, only paths on this allow-list are compared. Paths use dot
    /// and bracket syntax with `x` as the index wildcard, e.g.
    /// `lines[x].amount`; a listed path includes everything beneath it.
    pub included_paths: Option<Vec<String>>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            array_policies: IndexMap::new(),
            excluded_attributes: DEFAULT_EXCLUDED_ATTRIBUTES
                .iter()
                .map(ToString::to_string)
                .collect(),
            included_paths: None,
        }
    }
}

/// A stable, path-sorted set of changes.
pub type Diff = collections::BTreeMap<String, Change>;

/// One detected difference.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Change {
    /// An array of objects reconciled by comparison key.
    Array(ArrayChanges),
    /// A scalar, object or array value that differs.
    #[serde(rename_all = "camelCase")]
    Value {
        /// The newer value; `None` when the attribute was removed.
        new_value: Option<Value>,
        /// The older value; `None` when the attribute was added.
        old_value: Option<Value>,
    },
}

/// Reconciliation buckets for an array of objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayChanges {
    /// Items present in both arrays whose contents differ, recursively
    /// compared.
    pub comparable_items: Vec<ComparedItem>,
    /// Items present only in the older array.
    pub deleted_items: Vec<Value>,
    /// Items present only in the newer array.
    pub new_items: Vec<Value>,
}

/// A keyed array item present in both versions.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComparedItem {
    /// The changes within the item, keyed by relative path.
    pub changes: Diff,
    /// The comparison-key value identifying the item.
    pub key: Value,
}

/// Compare two logical entities, reporting every attribute path that
/// differs.
pub fn diff_objects(old: &codec::Item, new: &codec::Item, options: &DiffOptions) -> Diff {
    let mut changes = Diff::new();
    diff_maps(old, new, "", options, &mut changes);
    changes
}

/// Sort a version listing ascending and attach each version's diff against
/// its immediate predecessor.
///
/// The current projection (version `0`) ranks last; snapshots order by
/// their timestamp-sortable version token. The first version carries no
/// changes.
pub fn compare_version_chain(mut versions: Vec<codec::Item>, options: &DiffOptions) -> Vec<codec::Item> {
    versions.sort_by_cached_key(version_rank);
    for index in 1..versions.len() {
        let changes = diff_objects(&versions[index - 1], &versions[index], options);
        let changes = serde_json::to_value(&changes)
            .expect("a diff always serializes");
        versions[index].insert(CHANGES_ATTRIBUTE.to_string(), changes);
    }
    versions
}

fn version_rank(item: &codec::Item) -> (u8, i64, String) {
    match item.get(recipe::VERSION_ATTRIBUTE) {
        Some(Value::Number(number)) if number.as_i64() == Some(0) => (1, 0, String::new()),
        Some(Value::String(token)) => {
            let number = item
                .get("versionNumber")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            (0, number, token.clone())
        }
        _ => (0, 0, String::new()),
    }
}

fn normalize_index(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut in_brackets = false;
    for character in path.chars() {
        match character {
            '[' => {
                in_brackets = true;
                normalized.push('[');
                normalized.push('x');
            }
            ']' => {
                in_brackets = false;
                normalized.push(']');
            }
            _ if in_brackets => {}
            _ => normalized.push(character),
        }
    }
    normalized
}

fn path_included(path: &str, options: &DiffOptions) -> bool {
    let Some(included) = &options.included_paths else {
        return true;
    };
    let normalized = normalize_index(path);
    included.iter().any(|allowed| {
        normalized == *allowed
            || normalized.starts_with(&format!("{allowed}."))
            || normalized.starts_with(&format!("{allowed}["))
            || allowed.starts_with(&format!("{normalized}."))
            || allowed.starts_with(&format!("{normalized}["))
    })
}

fn join_path(prefix: &str, attribute: &str) -> String {
    if prefix.is_empty() {
        attribute.to_string()
    } else {
        format!("{prefix}.{attribute}")
    }
}

fn diff_maps(
    old: &codec::Item,
    new: &codec::Item,
    prefix: &str,
    options: &DiffOptions,
    changes: &mut Diff,
) {
    let mut attributes: Vec<&String> = old.keys().chain(new.keys()).collect();
    attributes.sort();
    attributes.dedup();

    for attribute in attributes {
        if options.excluded_attributes.iter().any(|excluded| excluded == attribute) {
            continue;
        }
        let path = join_path(prefix, attribute);
        if !path_included(&path, options) {
            continue;
        }
        match (old.get(attribute), new.get(attribute)) {
            (Some(old_value), Some(new_value)) if old_value == new_value => {}
            (Some(Value::Object(old_value)), Some(Value::Object(new_value))) => {
                diff_maps(old_value, new_value, &path, options, changes);
            }
            (Some(Value::Array(old_value)), Some(Value::Array(new_value))) => {
                diff_arrays(attribute, old_value, new_value, &path, options, changes);
            }
            (old_value, new_value) => {
                changes.insert(
                    path,
                    Change::Value {
                        new_value: new_value.cloned(),
                        old_value: old_value.cloned(),
                    },
                );
            }
        }
    }
}

fn diff_arrays(
    attribute: &str,
    old: &[Value],
    new: &[Value],
    path: &str,
    options: &DiffOptions,
    changes: &mut Diff,
) {
    match options.array_policies.get(attribute) {
        Some(ArrayPolicy::Unordered) => {
            if !same_members(old, new) {
                changes.insert(
                    path.to_string(),
                    Change::Value {
                        new_value: Some(Value::Array(new.to_vec())),
                        old_value: Some(Value::Array(old.to_vec())),
                    },
                );
            }
        }
        Some(ArrayPolicy::KeyedBy(key)) => {
            let buckets = reconcile_keyed(key, old, new, path, options);
            if !buckets.comparable_items.is_empty()
                || !buckets.deleted_items.is_empty()
                || !buckets.new_items.is_empty()
            {
                changes.insert(path.to_string(), Change::Array(buckets));
            }
        }
        Some(ArrayPolicy::Ordered) | None => {
            // Positional comparison; equality was already ruled out.
            changes.insert(
                path.to_string(),
                Change::Value {
                    new_value: Some(Value::Array(new.to_vec())),
                    old_value: Some(Value::Array(old.to_vec())),
                },
            );
        }
    }
}

fn same_members(old: &[Value], new: &[Value]) -> bool {
    if old.len() != new.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = new.iter().collect();
    for value in old {
        match remaining.iter().position(|candidate| *candidate == value) {
            Some(position) => {
                remaining.swap_remove(position);
            }
            None => return false,
        }
    }
    true
}

fn reconcile_keyed(
    key: &str,
    old: &[Value],
    new: &[Value],
    path: &str,
    options: &DiffOptions,
) -> ArrayChanges {
    let old_keyed: Vec<(&Value, &codec::Item)> = old
        .iter()
        .filter_map(|value| value.as_object())
        .filter_map(|item| item.get(key).map(|id| (id, item)))
        .collect();
    let new_keyed: Vec<(&Value, &codec::Item)> = new
        .iter()
        .filter_map(|value| value.as_object())
        .filter_map(|item| item.get(key).map(|id| (id, item)))
        .collect();

    let mut buckets = ArrayChanges::default();
    for (id, new_item) in &new_keyed {
        match old_keyed.iter().find(|(old_id, _)| old_id == id) {
            Some((_, old_item)) => {
                let mut item_changes = Diff::new();
                // Relative paths inside the item, normalized under the
                // array wildcard for the allow-list.
                let item_prefix = format!("{path}[x]");
                diff_maps(old_item, new_item, &item_prefix, options, &mut item_changes);
                if !item_changes.is_empty() {
                    buckets.comparable_items.push(ComparedItem {
                        changes: item_changes,
                        key: (*id).clone(),
                    });
                }
            }
            None => buckets.new_items.push(Value::Object((*new_item).clone())),
        }
    }
    for (id, old_item) in &old_keyed {
        if !new_keyed.iter().any(|(new_id, _)| new_id == id) {
            buckets.deleted_items.push(Value::Object((*old_item).clone()));
        }
    }
    buckets
}
