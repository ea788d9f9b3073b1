use crate::{codec, error, store};

use aws_sdk_dynamodb::{Client, types};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::collections;

/// [`StoreClient`](store::StoreClient) implementation over
/// `aws-sdk-dynamodb`.
///
/// Translates the engine's structured requests into expression strings with
/// `#name`/`:value` placeholders and maps
/// `ConditionalCheckFailedException` to
/// [`ConditionFailed`](error::Error::ConditionFailed); every other SDK error
/// passes through with operation and table context attached.
#[derive(Clone, Debug)]
pub struct DynamoStoreClient {
    client: Client,
}

impl DynamoStoreClient {
    /// Wrap an SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn store_error(
    operation: &'static str,
    table_name: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> error::Error {
    error::Error::Store {
        operation,
        source: Box::new(source),
        table: table_name.to_string(),
    }
}

fn primary_key(pk: &str, sk: &str) -> collections::HashMap<String, types::AttributeValue> {
    collections::HashMap::from([
        ("pk".to_string(), types::AttributeValue::S(pk.to_string())),
        ("sk".to_string(), types::AttributeValue::S(sk.to_string())),
    ])
}

struct QueryExpressions {
    expression_attribute_names: collections::HashMap<String, String>,
    expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
    filter_expression: Option<String>,
    key_condition_expression: String,
}

impl TryFrom<&store::QueryRequest> for QueryExpressions {
    type Error = error::Error;

    fn try_from(request: &store::QueryRequest) -> error::Result<Self> {
        let key = &request.key_condition.name;
        let mut expression_attribute_names =
            collections::HashMap::from([(format!("#{key}"), key.clone())]);
        let mut expression_attribute_values = collections::HashMap::from([(
            format!(":{key}"),
            to_attribute_value(&request.key_condition.value)?,
        )]);
        let mut key_condition_expression = format!("#{key} = :{key}");
        if let Some(sort_key) = &request.key_condition.sort_key {
            let name = &sort_key.name;
            key_condition_expression
                .push_str(&format!(" AND begins_with(#{name}, :{name})"));
            expression_attribute_names.insert(format!("#{name}"), name.clone());
            expression_attribute_values.insert(
                format!(":{name}"),
                types::AttributeValue::S(sort_key.prefix.clone()),
            );
        }
        let mut filter_clauses = Vec::with_capacity(request.filters.len());
        for (name, value) in &request.filters {
            expression_attribute_names.insert(format!("#{name}"), name.clone());
            expression_attribute_values.insert(format!(":{name}"), to_attribute_value(value)?);
            filter_clauses.push(format!("#{name} = :{name}"));
        }
        let filter_expression = if filter_clauses.is_empty() {
            None
        } else {
            Some(filter_clauses.join(" AND "))
        };
        Ok(Self {
            expression_attribute_names,
            expression_attribute_values,
            filter_expression,
            key_condition_expression,
        })
    }
}

struct UpdateExpressions {
    condition_expression: Option<String>,
    expression_attribute_names: collections::HashMap<String, String>,
    expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
    update_expression: String,
}

impl TryFrom<&store::UpdateRequest> for UpdateExpressions {
    type Error = error::Error;

    fn try_from(request: &store::UpdateRequest) -> error::Result<Self> {
        let mut expression_attribute_names = collections::HashMap::new();
        let mut expression_attribute_values = collections::HashMap::new();
        let mut clauses = Vec::new();

        if !request.add.is_empty() {
            let mut add_clauses = Vec::with_capacity(request.add.len());
            for (name, amount) in &request.add {
                expression_attribute_names.insert(format!("#{name}"), name.clone());
                expression_attribute_values
                    .insert(format!(":{name}"), types::AttributeValue::N(amount.to_string()));
                add_clauses.push(format!("#{name} :{name}"));
            }
            clauses.push(format!("ADD {}", add_clauses.join(", ")));
        }
        if !request.set.is_empty() {
            let mut set_clauses = Vec::with_capacity(request.set.len());
            for (name, value) in &request.set {
                expression_attribute_names.insert(format!("#{name}"), name.clone());
                expression_attribute_values.insert(format!(":{name}"), to_attribute_value(value)?);
                set_clauses.push(format!("#{name} = :{name}"));
            }
            clauses.push(format!("SET {}", set_clauses.join(", ")));
        }
        if !request.remove.is_empty() {
            let mut remove_clauses = Vec::with_capacity(request.remove.len());
            for name in &request.remove {
                expression_attribute_names.insert(format!("#{name}"), name.clone());
                remove_clauses.push(format!("#{name}"));
            }
            clauses.push(format!("REMOVE {}", remove_clauses.join(", ")));
        }

        let condition_expression = match request.guard {
            store::ExistenceGuard::MustExist => {
                Some("attribute_exists(pk) AND attribute_exists(sk)".to_string())
            }
            store::ExistenceGuard::MustNotExist => {
                Some("attribute_not_exists(pk) AND attribute_not_exists(sk)".to_string())
            }
            store::ExistenceGuard::Unguarded => None,
        };

        Ok(Self {
            condition_expression,
            expression_attribute_names,
            expression_attribute_values,
            update_expression: clauses.join(" "),
        })
    }
}

impl store::StoreClient for DynamoStoreClient {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_item", skip(self), err)
    )]
    async fn get_item(
        &self,
        table_name: &str,
        pk: &str,
        sk: &str,
    ) -> error::Result<Option<codec::Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .set_key(Some(primary_key(pk, sk)))
            .send()
            .await
            .map_err(|source| store_error("GetItem", table_name, source))?;
        output
            .item
            .map(|item| from_item(item).map_err(Into::into))
            .transpose()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.query", skip(self), err)
    )]
    async fn query(&self, request: store::QueryRequest) -> error::Result<store::QueryResponse> {
        let expressions: QueryExpressions = (&request).try_into()?;
        let exclusive_start_key = request
            .exclusive_start_key
            .as_ref()
            .map(to_item)
            .transpose()?;
        let output = self
            .client
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .key_condition_expression(expressions.key_condition_expression)
            .set_filter_expression(expressions.filter_expression)
            .set_expression_attribute_names(Some(expressions.expression_attribute_names))
            .set_expression_attribute_values(Some(expressions.expression_attribute_values))
            .set_exclusive_start_key(exclusive_start_key)
            .set_limit(request.limit)
            .send()
            .await
            .map_err(|source| store_error("Query", &request.table_name, source))?;
        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(from_item)
            .collect::<Result<_, _>>()?;
        let last_evaluated_key = output
            .last_evaluated_key
            .map(|key| from_item(key).map_err(error::Error::from))
            .transpose()?;
        Ok(store::QueryResponse {
            items,
            last_evaluated_key,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.conditional_update", skip(self), err)
    )]
    async fn conditional_update(
        &self,
        request: store::UpdateRequest,
    ) -> error::Result<codec::Item> {
        let expressions: UpdateExpressions = (&request).try_into()?;
        let output = self
            .client
            .update_item()
            .table_name(&request.table_name)
            .set_key(Some(primary_key(&request.pk, &request.sk)))
            .update_expression(expressions.update_expression)
            .set_condition_expression(expressions.condition_expression)
            .set_expression_attribute_names(Some(expressions.expression_attribute_names))
            .set_expression_attribute_values(Some(expressions.expression_attribute_values))
            .return_values(types::ReturnValue::AllNew)
            .send()
            .await
            .map_err(|source| {
                let service_error = source.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    error::Error::ConditionFailed {
                        pk: request.pk.clone(),
                        sk: request.sk.clone(),
                    }
                } else {
                    store_error("UpdateItem", &request.table_name, service_error)
                }
            })?;
        let attributes = output.attributes.unwrap_or_default();
        from_item(attributes).map_err(Into::into)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.put_item", skip(self, item), err)
    )]
    async fn put_item(&self, table_name: &str, item: codec::Item) -> error::Result<()> {
        let item = to_item(&item)?;
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|source| store_error("PutItem", table_name, source))?;
        Ok(())
    }
}
