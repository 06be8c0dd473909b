pub mod core;
pub mod firestore;
pub mod identity;
pub mod provider;

use std::sync::{Arc, Mutex};

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::core::middleware::SessionAuthMiddleware;
use crate::firestore::FirebaseFirestore;
use crate::identity::session::SessionStore;
use crate::identity::{FirebaseAuth, LogoutHook};

pub use crate::identity::models::AuthUser;
pub use crate::provider::options::ProviderOptions;
pub use crate::provider::{FireClient, FirebaseAuthProvider, FirebaseDataProvider, ProviderError};

/// Project-level configuration for a [`FirebaseApp`].
///
/// The URL overrides exist for emulators and tests; when unset, requests go
/// to the production Google endpoints.
#[derive(Debug, Clone, Default)]
pub struct FirebaseConfig {
    /// Web API key, sent as the `key` query parameter on Identity Toolkit calls.
    pub api_key: String,
    pub project_id: String,
    pub firestore_url: Option<String>,
    pub identity_url: Option<String>,
}

/// Root handle tying together the HTTP stack, the signed-in-user session and
/// the service accessors.
///
/// Cloning is cheap and every clone shares the same session: pass a clone as
/// [`ProviderOptions::app`] to run the data provider and the auth provider
/// against one login.
#[derive(Clone)]
pub struct FirebaseApp {
    config: FirebaseConfig,
    client: ClientWithMiddleware,
    session: SessionStore,
    logout_hooks: Arc<Mutex<Vec<LogoutHook>>>,
}

impl FirebaseApp {
    pub fn new(config: FirebaseConfig) -> Self {
        let session = SessionStore::new();
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(SessionAuthMiddleware::new(session.clone()))
            .build();

        Self {
            config,
            client,
            session,
            logout_hooks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn firestore(&self) -> FirebaseFirestore {
        match &self.config.firestore_url {
            Some(url) => FirebaseFirestore::new_with_url(self.client.clone(), url.clone()),
            None => FirebaseFirestore::new(self.client.clone(), &self.config.project_id),
        }
    }

    pub fn auth(&self) -> FirebaseAuth {
        let auth = FirebaseAuth::new(
            self.config.api_key.clone(),
            self.session.clone(),
            Arc::clone(&self.logout_hooks),
        );
        match &self.config.identity_url {
            Some(url) => auth.with_url(url.clone()),
            None => auth,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}
