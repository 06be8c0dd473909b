use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use crate::identity::models::AuthUser;
use crate::identity::AuthError;
use crate::{FirebaseApp, FirebaseConfig};

fn test_app(server: &MockServer) -> FirebaseApp {
    FirebaseApp::new(FirebaseConfig {
        api_key: "test-key".to_string(),
        project_id: "test-project".to_string(),
        firestore_url: None,
        identity_url: Some(server.url("/v1")),
    })
}

fn test_user(id_token: &str) -> AuthUser {
    AuthUser {
        uid: "u1".to_string(),
        email: Some("alice@example.com".to_string()),
        display_name: None,
        id_token: id_token.to_string(),
        refresh_token: None,
    }
}

#[tokio::test]
async fn sign_in_stores_the_session() {
    let server = MockServer::start();
    let app = test_app(&server);
    let auth = app.auth();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:signInWithPassword")
            .query_param("key", "test-key");
        then.status(200).json_body(json!({
            "localId": "u1",
            "email": "alice@example.com",
            "idToken": "tok123",
            "refreshToken": "refresh123"
        }));
    });

    let user = auth
        .sign_in_with_password("alice@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(user.uid, "u1");
    assert!(app.session().is_signed_in());
    assert_eq!(auth.current_user().unwrap().id_token, "tok123");
    mock.assert();
}

#[tokio::test]
async fn failed_sign_in_surfaces_the_api_message() {
    let server = MockServer::start();
    let app = test_app(&server);
    let auth = app.auth();

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(400).json_body(json!({
            "error": { "code": 400, "message": "INVALID_PASSWORD", "status": "INVALID_ARGUMENT" }
        }));
    });

    let err = auth
        .sign_in_with_password("alice@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ApiError(_)));
    assert!(err.to_string().contains("INVALID_PASSWORD"));
    assert!(!app.session().is_signed_in());
}

#[tokio::test]
async fn sign_out_clears_the_session_and_runs_hooks() {
    let server = MockServer::start();
    let app = test_app(&server);
    let auth = app.auth();
    app.session().set(test_user("tok"));

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    auth.on_logout(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    auth.sign_out();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(matches!(auth.current_user(), Err(AuthError::NotSignedIn)));
}

#[tokio::test]
async fn lookup_returns_the_account_record() {
    let server = MockServer::start();
    let app = test_app(&server);
    let auth = app.auth();
    app.session().set(test_user("tok123"));

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:lookup")
            .query_param("key", "test-key");
        then.status(200).json_body(json!({
            "users": [{
                "localId": "u1",
                "email": "alice@example.com",
                "emailVerified": true
            }]
        }));
    });

    let account = auth.lookup().await.unwrap();
    assert_eq!(account.local_id, "u1");
    assert_eq!(account.email_verified, Some(true));
    mock.assert();
}

#[test]
fn token_claims_decode_without_verification() {
    let claims = json!({ "sub": "u1", "admin": true });
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let token = format!("header.{}.signature", payload);

    let app = FirebaseApp::new(FirebaseConfig {
        api_key: "k".to_string(),
        project_id: "p".to_string(),
        ..Default::default()
    });
    let auth = app.auth();
    app.session().set(test_user(&token));

    let decoded = auth.token_claims().unwrap();
    assert_eq!(decoded["admin"], json!(true));
    assert_eq!(decoded["sub"], json!("u1"));
}

#[test]
fn claims_of_a_garbage_token_are_rejected() {
    let app = FirebaseApp::new(FirebaseConfig {
        api_key: "k".to_string(),
        project_id: "p".to_string(),
        ..Default::default()
    });
    let auth = app.auth();
    app.session().set(test_user("not-a-jwt"));

    assert!(matches!(
        auth.token_claims(),
        Err(AuthError::MalformedToken)
    ));
}
