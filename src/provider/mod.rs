//! The adapter between the admin framework's CRUD/query contract and the
//! Firestore/Identity clients: parameter bundles, the session context, the
//! resource cache and the two provider facades.

pub mod client;
pub mod dates;
pub mod options;
pub mod params;
pub mod queries;
pub mod resource;


use serde_json::Value;
use thiserror::Error;

use crate::firestore::FirestoreError;
use crate::identity::models::{AccountInfo, AuthUser};
use crate::identity::{AuthError, FirebaseAuth};
use crate::{FirebaseApp, FirebaseConfig};

pub use client::{FireClient, ANONYMOUS_USER};
pub use options::ProviderOptions;
pub use params::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, IdsResult, ListResult, Pagination, RecordResult,
    SortField, SortOrder, UpdateManyParams, UpdateParams,
};
pub use resource::{CollectionQuery, Resource, ResourceManager};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("can't find resource: \"{0}\"")]
    ResourceNotFound(String),
    #[error("no document matching: {path}/{id}")]
    DocumentNotFound { path: String, id: String },
    #[error("a document already exists at: {path}/{id}")]
    DocumentExists { path: String, id: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// CRUD facade in the shape the admin framework dispatches: one method per
/// framework verb, each delegating to the matching operation function.
pub struct FirebaseDataProvider {
    client: FireClient,
}

impl FirebaseDataProvider {
    pub fn new(config: FirebaseConfig, options: ProviderOptions) -> Self {
        Self {
            client: FireClient::new(config, options),
        }
    }

    pub fn client(&self) -> &FireClient {
        &self.client
    }

    pub async fn get_list(
        &self,
        resource: &str,
        params: GetListParams,
    ) -> Result<ListResult, ProviderError> {
        queries::get_list(resource, params, &self.client).await
    }

    pub async fn get_one(
        &self,
        resource: &str,
        params: GetOneParams,
    ) -> Result<RecordResult, ProviderError> {
        queries::get_one(resource, params, &self.client).await
    }

    pub async fn get_many(
        &self,
        resource: &str,
        params: GetManyParams,
    ) -> Result<ListResult, ProviderError> {
        queries::get_many(resource, params, &self.client).await
    }

    pub async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult, ProviderError> {
        queries::get_many_reference(resource, params, &self.client).await
    }

    pub async fn create(
        &self,
        resource: &str,
        params: CreateParams,
    ) -> Result<RecordResult, ProviderError> {
        queries::create(resource, params, &self.client).await
    }

    pub async fn update(
        &self,
        resource: &str,
        params: UpdateParams,
    ) -> Result<RecordResult, ProviderError> {
        queries::update(resource, params, &self.client).await
    }

    pub async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> Result<IdsResult, ProviderError> {
        queries::update_many(resource, params, &self.client).await
    }

    pub async fn delete(
        &self,
        resource: &str,
        params: DeleteParams,
    ) -> Result<RecordResult, ProviderError> {
        queries::delete(resource, params, &self.client).await
    }

    pub async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> Result<IdsResult, ProviderError> {
        queries::delete_many(resource, params, &self.client).await
    }
}

/// Auth facade: login/logout plus the session checks the framework calls
/// between navigations.
pub struct FirebaseAuthProvider {
    auth: FirebaseAuth,
}

impl FirebaseAuthProvider {
    /// `options.app`, when set, takes precedence over `config`; pass the
    /// same app as the data provider so a logout clears its caches too.
    pub fn new(config: FirebaseConfig, options: ProviderOptions) -> Self {
        let app = options.app.unwrap_or_else(|| FirebaseApp::new(config));
        Self { auth: app.auth() }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        Ok(self.auth.sign_in_with_password(email, password).await?)
    }

    pub fn logout(&self) {
        self.auth.sign_out();
    }

    /// Errors when no user is signed in; the framework redirects to login.
    pub fn check_auth(&self) -> Result<(), ProviderError> {
        self.auth.current_user()?;
        Ok(())
    }

    /// A 401 or 403 from the backend invalidates the session; any other
    /// status leaves it alone.
    pub fn check_error(&self, status: u16) -> Result<(), ProviderError> {
        if status == 401 || status == 403 {
            self.auth.sign_out();
            return Err(ProviderError::Auth(AuthError::NotSignedIn));
        }
        Ok(())
    }

    /// Custom claims of the current ID token, for role-based UIs.
    pub fn get_permissions(&self) -> Result<Value, ProviderError> {
        Ok(self.auth.token_claims()?)
    }

    pub async fn get_identity(&self) -> Result<AccountInfo, ProviderError> {
        Ok(self.auth.lookup().await?)
    }
}
