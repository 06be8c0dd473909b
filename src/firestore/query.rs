use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, Direction, FieldFilter, FieldOperator,
    FieldReference, FilterType, Order, QueryFilter, RunQueryRequest, RunQueryResponse,
    StructuredQuery,
};
use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::value::json_to_value;
use super::{api_error, FirestoreError};

/// A structured-query definition targeting one collection.
///
/// Built independently of a client so callers can pass query transforms
/// around (the resource cache accepts one to scope its refresh reads).
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) query: StructuredQuery,
}

impl Query {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            query: StructuredQuery {
                from: Some(vec![CollectionSelector {
                    collection_id: collection_id.into(),
                    all_descendants: None,
                }]),
                where_clause: None,
                order_by: None,
                offset: None,
                limit: None,
            },
        }
    }

    /// Adds a field filter; multiple filters combine with AND.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        let serde_value = serde_json::to_value(value)?;
        let firestore_value = json_to_value(serde_value)?;

        let filter = QueryFilter {
            filter_type: Some(FilterType::FieldFilter(FieldFilter {
                field: FieldReference {
                    field_path: field.to_string(),
                },
                op,
                value: firestore_value,
            })),
        };

        if let Some(existing_where) = &self.query.where_clause {
            let new_composite = match &existing_where.filter_type {
                Some(FilterType::CompositeFilter(cf)) if cf.op == CompositeOperator::And => {
                    let mut filters = cf.filters.clone();
                    filters.push(filter);
                    CompositeFilter {
                        op: CompositeOperator::And,
                        filters,
                    }
                }
                _ => CompositeFilter {
                    op: CompositeOperator::And,
                    filters: vec![existing_where.clone(), filter],
                },
            };

            self.query.where_clause = Some(QueryFilter {
                filter_type: Some(FilterType::CompositeFilter(new_composite)),
            });
        } else {
            self.query.where_clause = Some(filter);
        }

        Ok(self)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        let order = Order {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction,
        };

        if let Some(order_by) = &mut self.query.order_by {
            order_by.push(order);
        } else {
            self.query.order_by = Some(vec![order]);
        }

        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.query.offset = Some(offset);
        self
    }
}

/// A [`Query`] bound to a client and parent path, ready for execution.
#[derive(Clone)]
pub struct ExecutableQuery {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) parent_path: String,
    pub(crate) query: Query,
}

impl ExecutableQuery {
    pub(crate) fn new(client: ClientWithMiddleware, parent_path: String, query: Query) -> Self {
        Self {
            client,
            parent_path,
            query,
        }
    }

    pub fn where_filter<T: Serialize>(
        self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        Ok(Self {
            query: self.query.where_filter(field, op, value)?,
            ..self
        })
    }

    pub fn order_by(self, field: &str, direction: Direction) -> Self {
        Self {
            query: self.query.order_by(field, direction),
            ..self
        }
    }

    pub fn limit(self, limit: i32) -> Self {
        Self {
            query: self.query.limit(limit),
            ..self
        }
    }

    pub fn offset(self, offset: i32) -> Self {
        Self {
            query: self.query.offset(offset),
            ..self
        }
    }

    /// Applies a caller-supplied transform to the underlying query.
    pub fn map_query(self, f: impl FnOnce(Query) -> Query) -> Self {
        Self {
            query: f(self.query),
            ..self
        }
    }

    /// Runs the query and collects the matching documents.
    pub async fn get(&self) -> Result<QuerySnapshot, FirestoreError> {
        let url = format!("{}:runQuery", self.parent_path);

        let request = RunQueryRequest {
            structured_query: Some(self.query.query.clone()),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Run query failed").await);
        }

        let responses: Vec<RunQueryResponse> = response.json().await?;

        let mut documents = Vec::new();
        for res in responses {
            if let Some(doc) = res.document {
                let id = doc.id().to_string();
                documents.push(DocumentSnapshot {
                    id,
                    document: Some(doc),
                });
            }
        }

        Ok(QuerySnapshot { documents })
    }
}
