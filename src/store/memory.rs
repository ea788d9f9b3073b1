use crate::{codec, error, store};

use serde_json::Value;
use std::collections;
use std::sync;

/// In-memory [`StoreClient`](store::StoreClient) implementation.
///
/// Honors the engine's existence guards and `ADD`/`SET`/`REMOVE` update
/// semantics, evaluates key conditions and equality filters structurally,
/// and paginates with native `{pk, sk}` keys. Items within a table are
/// ordered by the queried sort attribute, then by primary key, so query
/// results are deterministic.
///
/// Intended for tests and local development; a single process-wide lock
/// serializes writes, which is exactly what makes the optimistic-concurrency
/// tests meaningful.
#[derive(Debug, Default)]
pub struct MemoryStoreClient {
    tables: sync::Mutex<collections::HashMap<String, Table>>,
}

type Table = collections::BTreeMap<(String, String), codec::Item>;

impl MemoryStoreClient {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every item in a table, in primary-key order.
    pub fn items(&self, table_name: &str) -> Vec<codec::Item> {
        let tables = self.tables.lock().expect("store lock poisoned");
        tables
            .get(table_name)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn item_key(item: &codec::Item) -> error::Result<(String, String)> {
    let pk = item.get("pk").and_then(Value::as_str);
    let sk = item.get("sk").and_then(Value::as_str);
    match (pk, sk) {
        (Some(pk), Some(sk)) => Ok((pk.to_string(), sk.to_string())),
        _ => Err(error::Error::MalformedEntity),
    }
}

fn matches_query(item: &codec::Item, request: &store::QueryRequest) -> bool {
    if item.get(&request.key_condition.name) != Some(&request.key_condition.value) {
        return false;
    }
    if let Some(sort_key) = &request.key_condition.sort_key {
        let begins_with = item
            .get(&sort_key.name)
            .and_then(Value::as_str)
            .is_some_and(|value| value.starts_with(&sort_key.prefix));
        if !begins_with {
            return false;
        }
    }
    request
        .filters
        .iter()
        .all(|(name, value)| item.get(name) == Some(value))
}

fn sort_value<'a>(item: &'a codec::Item, request: &store::QueryRequest) -> &'a str {
    let sort_attribute = request
        .key_condition
        .sort_key
        .as_ref()
        .map_or("sk", |sort_key| sort_key.name.as_str());
    item.get(sort_attribute).and_then(Value::as_str).unwrap_or("")
}

impl store::StoreClient for MemoryStoreClient {
    async fn get_item(
        &self,
        table_name: &str,
        pk: &str,
        sk: &str,
    ) -> error::Result<Option<codec::Item>> {
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables
            .get(table_name)
            .and_then(|table| table.get(&(pk.to_string(), sk.to_string())))
            .cloned())
    }

    async fn query(&self, request: store::QueryRequest) -> error::Result<store::QueryResponse> {
        let tables = self.tables.lock().expect("store lock poisoned");
        let mut matching: Vec<(&(String, String), &codec::Item)> = tables
            .get(&request.table_name)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, item)| matches_query(item, &request))
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|(left_key, left), (right_key, right)| {
            sort_value(left, &request)
                .cmp(sort_value(right, &request))
                .then_with(|| left_key.cmp(right_key))
        });

        let start = match &request.exclusive_start_key {
            Some(key) => {
                let resume_after = item_key(key)?;
                matching
                    .iter()
                    .position(|(key, _)| **key == resume_after)
                    .map_or(0, |position| position + 1)
            }
            None => 0,
        };
        let remaining = &matching[start.min(matching.len())..];
        let page_len = request
            .limit
            .map_or(remaining.len(), |limit| (limit.max(0) as usize).min(remaining.len()));
        let page = &remaining[..page_len];

        let last_evaluated_key = if page_len < remaining.len() && page_len > 0 {
            let (key, _) = page[page_len - 1];
            let mut native = codec::Item::new();
            native.insert("pk".to_string(), Value::String(key.0.clone()));
            native.insert("sk".to_string(), Value::String(key.1.clone()));
            Some(native)
        } else {
            None
        };

        Ok(store::QueryResponse {
            items: page.iter().map(|(_, item)| (*item).clone()).collect(),
            last_evaluated_key,
        })
    }

    async fn conditional_update(
        &self,
        request: store::UpdateRequest,
    ) -> error::Result<codec::Item> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let table = tables.entry(request.table_name.clone()).or_default();
        let key = (request.pk.clone(), request.sk.clone());
        let exists = table.contains_key(&key);
        match request.guard {
            store::ExistenceGuard::MustExist if !exists => {
                return Err(error::Error::ConditionFailed {
                    pk: request.pk,
                    sk: request.sk,
                });
            }
            store::ExistenceGuard::MustNotExist if exists => {
                return Err(error::Error::ConditionFailed {
                    pk: request.pk,
                    sk: request.sk,
                });
            }
            _ => {}
        }

        let item = table.entry(key).or_insert_with(|| {
            let mut item = codec::Item::new();
            item.insert("pk".to_string(), Value::String(request.pk.clone()));
            item.insert("sk".to_string(), Value::String(request.sk.clone()));
            item
        });
        for (name, amount) in &request.add {
            let current = item.get(name).and_then(Value::as_i64).unwrap_or(0);
            item.insert(name.clone(), Value::from(current + amount));
        }
        for (name, value) in &request.set {
            item.insert(name.clone(), value.clone());
        }
        for name in &request.remove {
            item.remove(name);
        }
        Ok(item.clone())
    }

    async fn put_item(&self, table_name: &str, item: codec::Item) -> error::Result<()> {
        let key = item_key(&item)?;
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables
            .entry(table_name.to_string())
            .or_default()
            .insert(key, item);
        Ok(())
    }
}
