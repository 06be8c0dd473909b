use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::models::Document;
use super::query::{ExecutableQuery, Query};
use super::value::{fields_to_json, serializable_to_fields};
use super::{api_error, FirestoreError};

/// Reference to a single document. Owns a handle to the shared HTTP client,
/// so it can be stored and used independently of the `FirebaseFirestore`
/// that created it.
#[derive(Clone)]
pub struct DocumentReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) path: String,
}

impl DocumentReference {
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetches the document. Returns `Ok(None)` when it does not exist.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        let response = self.client.get(&self.path).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(api_error(response, "Get document failed").await);
        }

        let doc: Document = response.json().await?;
        let serde_value = fields_to_json(doc.fields)?;
        let obj = serde_json::from_value(serde_value)?;
        Ok(Some(obj))
    }

    /// Writes the full document, replacing whatever was there.
    pub async fn set<T: Serialize>(&self, value: &T) -> Result<(), FirestoreError> {
        let fields = serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(&self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Set document failed").await);
        }

        Ok(())
    }

    /// Merges the given fields into the document. With an `update_mask`,
    /// only the named field paths are touched.
    pub async fn update<T: Serialize>(
        &self,
        value: &T,
        update_mask: Option<Vec<String>>,
    ) -> Result<(), FirestoreError> {
        let fields = serializable_to_fields(value)?;

        let mut url = self.path.clone();
        if let Some(mask) = update_mask {
            url.push('?');
            for (i, field) in mask.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                url.push_str(&format!("updateMask.fieldPaths={}", field));
            }
        }

        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Update document failed").await);
        }

        Ok(())
    }

    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self.client.delete(&self.path).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Delete document failed").await);
        }

        Ok(())
    }
}

/// Reference to a collection, possibly nested under a root document path.
#[derive(Clone)]
pub struct CollectionReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) path: String,
}

impl CollectionReference {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn doc(&self, document_id: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            path: format!("{}/{}", self.path, document_id),
        }
    }

    /// Starts a query over this collection's documents.
    pub fn query(&self) -> ExecutableQuery {
        let (parent, collection_id) = match self.path.rsplit_once('/') {
            Some((parent, id)) => (parent.to_string(), id.to_string()),
            None => (String::new(), self.path.clone()),
        };
        ExecutableQuery::new(self.client.clone(), parent, Query::new(collection_id))
    }

    /// Creates a document with a server-assigned id.
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<Document, FirestoreError> {
        let fields = serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .post(&self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Add document failed").await);
        }

        let doc: Document = response.json().await?;
        Ok(doc)
    }
}
