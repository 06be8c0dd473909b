use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::models::AuthUser;

/// Shared signed-in-user slot.
///
/// One per `FirebaseApp`; clones go to the request middleware (which reads
/// the ID token) and the auth client (which writes on sign-in/sign-out).
/// The lock is never held across an await point.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<AuthUser>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user: AuthUser) {
        *self.write() = Some(user);
    }

    /// Clears the slot, returning the user that was signed in, if any.
    pub fn clear(&self) -> Option<AuthUser> {
        self.write().take()
    }

    pub fn get(&self) -> Option<AuthUser> {
        self.read().clone()
    }

    pub fn id_token(&self) -> Option<String> {
        self.read().as_ref().map(|user| user.id_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<AuthUser>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<AuthUser>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
