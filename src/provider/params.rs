//! Parameter bundles and result shapes of the admin framework's CRUD
//! contract. Field names follow the framework's conventions so bundles can
//! be deserialized straight from its requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetListParams {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub sort: Option<SortField>,
    /// Field-equality criteria, matched against the documents.
    #[serde(default)]
    pub filter: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOneParams {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetManyParams {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetManyReferenceParams {
    /// Field on the target resource holding the referencing id.
    pub target: String,
    pub id: Value,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub sort: Option<SortField>,
    #[serde(default)]
    pub filter: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParams {
    /// New document body. An `id` entry, when present, becomes the document
    /// id instead of a server-assigned one.
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateManyParams {
    pub ids: Vec<String>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParams {
    pub id: String,
    /// Echoed back as the result, per the framework contract.
    #[serde(default)]
    pub previous_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteManyParams {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordResult {
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdsResult {
    pub data: Vec<String>,
}
