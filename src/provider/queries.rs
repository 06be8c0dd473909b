//! The operation functions behind the data provider facade. Each takes a
//! resource name, the framework's parameter bundle and the session context.
//!
//! List-shaped reads refresh the resource first and then sort, filter and
//! paginate the cached list in memory; the backend query itself stays
//! unfiltered unless a collection query scopes the refresh.

use std::cmp::Ordering;

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use tracing::debug;

use super::client::FireClient;
use super::params::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, IdsResult, ListResult, Pagination, RecordResult,
    SortField, SortOrder, UpdateManyParams, UpdateParams,
};
use super::ProviderError;

pub async fn get_list(
    resource_name: &str,
    params: GetListParams,
    client: &FireClient,
) -> Result<ListResult, ProviderError> {
    client.resources().refresh_resource(resource_name, None).await?;
    let resource = client.resources().get_resource(resource_name)?;

    let mut data = resource.list;
    if let Some(sort) = &params.sort {
        sort_list(&mut data, sort);
    }
    let filtered = filter_list(data, &params.filter);
    let total = filtered.len();
    let data = paginate(filtered, params.pagination.as_ref());

    Ok(ListResult { data, total })
}

pub async fn get_one(
    resource_name: &str,
    params: GetOneParams,
    client: &FireClient,
) -> Result<RecordResult, ProviderError> {
    let data = client
        .resources()
        .get_single_doc(resource_name, &params.id)
        .await?;
    Ok(RecordResult { data })
}

/// Returns the documents matching `params.ids`, in the order the ids were
/// supplied. Ids with no matching document are skipped.
pub async fn get_many(
    resource_name: &str,
    params: GetManyParams,
    client: &FireClient,
) -> Result<ListResult, ProviderError> {
    client.resources().refresh_resource(resource_name, None).await?;
    let resource = client.resources().get_resource(resource_name)?;

    let data: Vec<Value> = params
        .ids
        .iter()
        .filter_map(|id| {
            resource
                .list
                .iter()
                .find(|doc| doc.get("id").and_then(Value::as_str) == Some(id.as_str()))
                .cloned()
        })
        .collect();
    let total = data.len();

    Ok(ListResult { data, total })
}

pub async fn get_many_reference(
    resource_name: &str,
    params: GetManyReferenceParams,
    client: &FireClient,
) -> Result<ListResult, ProviderError> {
    client.resources().refresh_resource(resource_name, None).await?;
    let resource = client.resources().get_resource(resource_name)?;

    let mut data: Vec<Value> = resource
        .list
        .into_iter()
        .filter(|doc| doc.get(&params.target) == Some(&params.id))
        .collect();
    if let Some(sort) = &params.sort {
        sort_list(&mut data, sort);
    }
    let filtered = filter_list(data, &params.filter);
    let total = filtered.len();
    let data = paginate(filtered, params.pagination.as_ref());

    Ok(ListResult { data, total })
}

/// Creates a document, stamping the audit fields. A payload with an `id`
/// entry writes to that document id (and errors if it already exists);
/// otherwise the backend assigns one.
pub async fn create(
    resource_name: &str,
    params: CreateParams,
    client: &FireClient,
) -> Result<RecordResult, ProviderError> {
    let resource = client.resources().try_get_resource(resource_name)?;

    let mut data = params.data;
    let supplied_id = data.get("id").and_then(Value::as_str).map(str::to_string);
    stamp_create_fields(&mut data, client);

    let id = match supplied_id {
        Some(id) => {
            let doc_ref = resource.collection.doc(&id);
            if doc_ref.get::<Map<String, Value>>().await?.is_some() {
                return Err(ProviderError::DocumentExists {
                    path: resource.path.clone(),
                    id,
                });
            }
            // The id lives in the document name, not the stored fields.
            let mut stored = data.clone();
            stored.remove("id");
            doc_ref.set(&stored).await?;
            id
        }
        None => {
            let created = resource.collection.add(&data).await?;
            created.id().to_string()
        }
    };

    debug!(resource = resource_name, id = %id, "created document");
    data.insert("id".to_string(), Value::String(id));
    Ok(RecordResult {
        data: Value::Object(data),
    })
}

/// Merges `params.data` into the document, stamping `lastupdate`/`updatedby`.
pub async fn update(
    resource_name: &str,
    params: UpdateParams,
    client: &FireClient,
) -> Result<RecordResult, ProviderError> {
    let resource = client.resources().try_get_resource(resource_name)?;

    let mut data = params.data;
    data.remove("id");
    stamp_update_fields(&mut data, client);

    let mask: Vec<String> = data.keys().cloned().collect();
    resource
        .collection
        .doc(&params.id)
        .update(&data, Some(mask))
        .await?;

    debug!(resource = resource_name, id = %params.id, "updated document");
    data.insert("id".to_string(), Value::String(params.id));
    Ok(RecordResult {
        data: Value::Object(data),
    })
}

pub async fn update_many(
    resource_name: &str,
    params: UpdateManyParams,
    client: &FireClient,
) -> Result<IdsResult, ProviderError> {
    for id in &params.ids {
        update(
            resource_name,
            UpdateParams {
                id: id.clone(),
                data: params.data.clone(),
            },
            client,
        )
        .await?;
    }
    Ok(IdsResult { data: params.ids })
}

/// Deletes the document and echoes `previous_data` back, per the framework
/// contract.
pub async fn delete(
    resource_name: &str,
    params: DeleteParams,
    client: &FireClient,
) -> Result<RecordResult, ProviderError> {
    let resource = client.resources().try_get_resource(resource_name)?;
    resource.collection.doc(&params.id).delete().await?;

    debug!(resource = resource_name, id = %params.id, "deleted document");
    Ok(RecordResult {
        data: params.previous_data.unwrap_or(Value::Null),
    })
}

pub async fn delete_many(
    resource_name: &str,
    params: DeleteManyParams,
    client: &FireClient,
) -> Result<IdsResult, ProviderError> {
    let resource = client.resources().try_get_resource(resource_name)?;
    for id in &params.ids {
        resource.collection.doc(id).delete().await?;
    }
    debug!(
        resource = resource_name,
        count = params.ids.len(),
        "deleted documents"
    );
    Ok(IdsResult { data: params.ids })
}

fn stamp_create_fields(data: &mut Map<String, Value>, client: &FireClient) {
    let now = client
        .current_timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let by = client.user_identifier();
    data.insert("createdate".to_string(), Value::String(now.clone()));
    data.insert("lastupdate".to_string(), Value::String(now));
    data.insert("createdby".to_string(), Value::String(by.clone()));
    data.insert("updatedby".to_string(), Value::String(by));
}

fn stamp_update_fields(data: &mut Map<String, Value>, client: &FireClient) {
    let now = client
        .current_timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    data.insert("lastupdate".to_string(), Value::String(now));
    data.insert(
        "updatedby".to_string(),
        Value::String(client.user_identifier()),
    );
}

fn sort_list(list: &mut [Value], sort: &SortField) {
    list.sort_by(|a, b| {
        let left = a.get(&sort.field).unwrap_or(&Value::Null);
        let right = b.get(&sort.field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn filter_list(list: Vec<Value>, filter: &Map<String, Value>) -> Vec<Value> {
    if filter.is_empty() {
        return list;
    }
    list.into_iter()
        .filter(|doc| {
            filter
                .iter()
                .all(|(field, expected)| doc.get(field) == Some(expected))
        })
        .collect()
}

fn paginate(list: Vec<Value>, pagination: Option<&Pagination>) -> Vec<Value> {
    let Some(pagination) = pagination else {
        return list;
    };
    let per_page = pagination.per_page as usize;
    let start = pagination.page.saturating_sub(1) as usize * per_page;
    list.into_iter().skip(start).take(per_page).collect()
}
