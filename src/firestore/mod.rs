//! Cloud Firestore REST client.
//!
//! Mirrors the client SDK's structure with `CollectionReference` and
//! `DocumentReference`, plus a structured-query builder. References own a
//! handle to the shared HTTP client so they can be cached and used after the
//! `FirebaseFirestore` that created them goes out of scope.

pub mod models;
pub mod query;
pub mod reference;
pub mod snapshot;
pub(crate) mod value;

#[cfg(test)]
mod tests;

use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

use self::query::{ExecutableQuery, Query};
use self::reference::{CollectionReference, DocumentReference};
use crate::core::parse_error_response;

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub(crate) async fn api_error(response: reqwest::Response, default_msg: &str) -> FirestoreError {
    FirestoreError::ApiError(parse_error_response(response, default_msg).await)
}

/// Client for interacting with Cloud Firestore.
///
/// Typically obtained via `FirebaseApp::firestore()`.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseFirestore {
    pub fn new(client: ClientWithMiddleware, project_id: &str) -> Self {
        let base_url = FIRESTORE_V1_API.replace("{project_id}", project_id);
        Self { client, base_url }
    }

    /// Creates an instance with a custom base URL (emulators, tests).
    pub fn new_with_url(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Gets a `CollectionReference` for the collection at the given path.
    /// The path may be nested, e.g. `"tenants/acme/users"`.
    pub fn collection(&self, collection_path: &str) -> CollectionReference {
        CollectionReference {
            client: self.client.clone(),
            path: format!("{}/{}", self.base_url, collection_path),
        }
    }

    /// Gets a `DocumentReference` for the slash-separated document path
    /// (e.g. `"users/user1"`).
    pub fn doc(&self, document_path: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            path: format!("{}/{}", self.base_url, document_path),
        }
    }

    /// Creates an executable query rooted at the database's documents root.
    pub fn query(&self, query: Query) -> ExecutableQuery {
        ExecutableQuery::new(self.client.clone(), self.base_url.clone(), query)
    }
}
