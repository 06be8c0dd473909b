use chrono::{DateTime, Utc};

use super::options::ProviderOptions;
use super::resource::ResourceManager;
use crate::firestore::FirebaseFirestore;
use crate::identity::models::AuthUser;
use crate::identity::{AuthError, FirebaseAuth};
use crate::{FirebaseApp, FirebaseConfig};

/// Identity stamped into documents while no user is signed in.
pub const ANONYMOUS_USER: &str = "anonymous user";

/// Session-scoped context shared by every operation: one Firestore handle,
/// one auth handle, one resource cache.
///
/// Created at session start and owned by the caller; the resource cache
/// empties itself when the user signs out.
pub struct FireClient {
    app: FirebaseApp,
    db: FirebaseFirestore,
    auth: FirebaseAuth,
    options: ProviderOptions,
    resources: ResourceManager,
}

impl FireClient {
    /// Builds a session context. `options.app`, when set, takes precedence
    /// over `config` so several providers can share one login.
    pub fn new(config: FirebaseConfig, options: ProviderOptions) -> Self {
        let app = options
            .app
            .clone()
            .unwrap_or_else(|| FirebaseApp::new(config));
        let db = app.firestore();
        let auth = app.auth();
        let resources = ResourceManager::new(db.clone(), options.root_ref.clone());
        resources.clear_on_logout(&auth);

        Self {
            app,
            db,
            auth,
            options,
            resources,
        }
    }

    pub fn app(&self) -> &FirebaseApp {
        &self.app
    }

    pub fn db(&self) -> &FirebaseFirestore {
        &self.db
    }

    pub fn auth(&self) -> &FirebaseAuth {
        &self.auth
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// The signed-in user; errors when no session exists.
    pub fn current_user(&self) -> Result<AuthUser, AuthError> {
        self.auth.current_user()
    }

    /// Identity written into `createdby`/`updatedby`. Signed-out sessions
    /// stamp the sentinel rather than failing the write.
    pub fn user_identifier(&self) -> String {
        match self.auth.current_user() {
            Ok(user) if self.options.associate_users_by_id => user.uid,
            Ok(user) => user.email.unwrap_or(user.uid),
            Err(_) => ANONYMOUS_USER.to_string(),
        }
    }

    /// Local wall-clock time used for audit stamps. Firestore's
    /// server-assigned timestamps are not involved, so orderings across
    /// writers follow client clocks.
    pub fn current_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
