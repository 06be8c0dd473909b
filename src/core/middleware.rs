use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};

use crate::identity::session::SessionStore;

/// Attaches the signed-in user's ID token as a bearer token to every
/// outgoing request.
///
/// While no user is signed in, requests go out without an `Authorization`
/// header and are subject to the backend's security rules.
pub struct SessionAuthMiddleware {
    session: SessionStore,
}

impl SessionAuthMiddleware {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl Middleware for SessionAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        if let Some(token) = self.session.id_token() {
            // ID tokens are ASCII JWTs; a value rejected here is unrepresentable
            // as a header and the request proceeds anonymously.
            if let Ok(value) = header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                req.headers_mut().insert(header::AUTHORIZATION, value);
            }
        }

        next.run(req, extensions).await
    }
}
