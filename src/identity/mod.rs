//! Firebase Authentication (Identity Toolkit) REST client.
//!
//! Signs users in with the project's Web API key, keeps the resulting
//! session in a shared [`SessionStore`], and notifies registered hooks on
//! sign-out so session-scoped caches can drop their state.

pub mod models;
pub mod session;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;
use url::Url;

use crate::core::parse_error_response;
use models::{
    AccountInfo, AuthUser, LookupRequest, LookupResponse, SignInWithPasswordRequest,
    SignInWithPasswordResponse,
};
use session::SessionStore;

const IDENTITY_TOOLKIT_V1_API: &str = "https://identitytoolkit.googleapis.com/v1";

/// Callback run when the user signs out.
pub type LogoutHook = Box<dyn Fn() + Send + Sync>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("no user logged in")]
    NotSignedIn,
    #[error("malformed ID token")]
    MalformedToken,
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("invalid endpoint URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Client for the Identity Toolkit session endpoints.
///
/// Typically obtained via `FirebaseApp::auth()`; clones created from the
/// same app share one session and one set of logout hooks.
#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    session: SessionStore,
    logout_hooks: Arc<Mutex<Vec<LogoutHook>>>,
}

impl FirebaseAuth {
    pub fn new(
        api_key: String,
        session: SessionStore,
        logout_hooks: Arc<Mutex<Vec<LogoutHook>>>,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        // Sign-in traffic authenticates with the API key alone, so this
        // client carries no session middleware.
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            api_key,
            base_url: IDENTITY_TOOLKIT_V1_API.to_string(),
            session,
            logout_hooks,
        }
    }

    /// Overrides the endpoint base URL (emulators, tests).
    pub fn with_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, method: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&format!("{}/accounts:{}", self.base_url, method))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Exchanges email/password credentials for a session and stores it.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let url = self.endpoint("signInWithPassword")?;
        let request = SignInWithPasswordRequest {
            email: email.to_string(),
            password: password.to_string(),
            return_secure_token: true,
        };

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "Sign in failed").await,
            ));
        }

        let result: SignInWithPasswordResponse = response.json().await?;
        let user = AuthUser {
            uid: result.local_id,
            email: result.email,
            display_name: result.display_name,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
        };

        tracing::debug!(uid = %user.uid, "user signed in");
        self.session.set(user.clone());
        Ok(user)
    }

    /// Clears the session and runs every registered logout hook.
    pub fn sign_out(&self) {
        if let Some(user) = self.session.clear() {
            tracing::debug!(uid = %user.uid, "user signed out");
        }
        let hooks = self
            .logout_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
    }

    /// Registers a callback to run whenever the user signs out.
    pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.logout_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// The signed-in user. Errors when no session exists.
    pub fn current_user(&self) -> Result<AuthUser, AuthError> {
        self.session.get().ok_or(AuthError::NotSignedIn)
    }

    /// Fetches the account record behind the current session.
    pub async fn lookup(&self) -> Result<AccountInfo, AuthError> {
        let user = self.current_user()?;
        let url = self.endpoint("lookup")?;
        let request = LookupRequest {
            id_token: user.id_token,
        };

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "Account lookup failed").await,
            ));
        }

        let result: LookupResponse = response.json().await?;
        result
            .users
            .and_then(|mut users| users.pop())
            .ok_or(AuthError::NotSignedIn)
    }

    /// Claims carried by the current session's ID token.
    ///
    /// Decoded without signature verification: the token came straight from
    /// the sign-in endpoint and is only inspected locally for role hints.
    pub fn token_claims(&self) -> Result<serde_json::Value, AuthError> {
        let user = self.current_user()?;
        decode_claims(&user.id_token)
    }
}

fn decode_claims(token: &str) -> Result<serde_json::Value, AuthError> {
    let payload = token.split('.').nth(1).ok_or(AuthError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::MalformedToken)?;
    Ok(serde_json::from_slice(&bytes)?)
}
