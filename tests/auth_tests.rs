mod common;

use common::{api_url, client, unreachable_url, user, user_json};
use market_entry_client::auth::{AuthState, RegisterData, VerificationKind};
use market_entry_client::error::{Error, NETWORK_ERROR_MESSAGE};
use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_stores_token_and_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login/"))
        .and(body_json(json!({
            "email": "user7@example.com",
            "password": "correct-horse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Login successful",
            "token": "tok-7",
            "user": user_json(7)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.auth().restore().await;

    let logged_in = client
        .auth()
        .login("user7@example.com", "correct-horse")
        .await
        .unwrap();

    assert_eq!(logged_in, user(7));
    assert_eq!(client.auth().state(), AuthState::Authenticated(user(7)));
    assert_eq!(client.storage().get("authToken").as_deref(), Some("tok-7"));
    assert_eq!(client.auth().last_error(), None);
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_login_rejected_keeps_previous_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "non_field_errors": ["Invalid email or password"]
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.auth().restore().await;

    let result = client.auth().login("user7@example.com", "wrong").await;

    assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    assert_eq!(
        client.auth().last_error().as_deref(),
        Some("Invalid email or password")
    );
    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.auth().token(), None);
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_login_network_failure_keeps_existing_session() {
    let client = client(&unreachable_url());
    client.storage().set("authToken", "still-valid").unwrap();
    client.auth().set_user(user(3));

    let result = client.auth().login("other@example.com", "pw").await;

    assert!(matches!(result, Err(Error::Network(_))));
    assert_eq!(client.auth().last_error().as_deref(), Some(NETWORK_ERROR_MESSAGE));
    assert_eq!(client.auth().token().as_deref(), Some("still-valid"));
    assert_eq!(client.auth().current_user(), Some(user(3)));
}

#[tokio::test]
async fn test_register_with_verification_required() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/signup/"))
        .and(body_json(json!({
            "email": "new@example.com",
            "password": "s3cret!",
            "password_confirm": "s3cret!",
            "first_name": "New",
            "last_name": "User"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Please verify your email",
            "user": user_json(11),
            "email_verification_required": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let outcome = client
        .auth()
        .register(&RegisterData {
            email: "new@example.com".to_string(),
            password: "s3cret!".to_string(),
            first_name: "New".to_string(),
            last_name: "User".to_string(),
        })
        .await
        .unwrap();

    assert!(outcome.verification_required);
    assert!(!outcome.email_send_failed);
    assert_eq!(outcome.user, Some(user(11)));
    assert_eq!(client.auth().token(), None);
    assert_eq!(client.auth().current_user(), Some(user(11)));
}

#[tokio::test]
async fn test_register_with_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/signup/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "User created successfully",
            "user": user_json(12),
            "token": "tok-12"
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let outcome = client
        .auth()
        .register(&RegisterData {
            email: "user12@example.com".to_string(),
            password: "pw".to_string(),
            first_name: "Test".to_string(),
            last_name: "User12".to_string(),
        })
        .await
        .unwrap();

    assert!(!outcome.verification_required);
    assert_eq!(client.auth().token().as_deref(), Some("tok-12"));
    assert!(client.auth().is_authenticated());
}

#[tokio::test]
async fn test_register_duplicate_email_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/signup/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "email": ["user with this email already exists."]
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let result = client
        .auth()
        .register(&RegisterData {
            email: "dup@example.com".to_string(),
            password: "pw".to_string(),
            first_name: "Dup".to_string(),
            last_name: "User".to_string(),
        })
        .await;

    assert!(result.is_err());
    assert_eq!(
        client.auth().last_error().as_deref(),
        Some("user with this email already exists.")
    );
    assert!(!client.auth().is_authenticated());
}

#[tokio::test]
async fn test_restore_with_valid_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/profile/"))
        .and(header("Authorization", "Token tok-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(5)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.storage().set("authToken", "tok-5").unwrap();
    assert!(client.auth().is_loading());

    client.auth().restore().await;
    // A second restore in the same page load is a no-op.
    client.auth().restore().await;

    assert_eq!(client.auth().state(), AuthState::Authenticated(user(5)));
    assert_eq!(client.auth().token().as_deref(), Some("tok-5"));
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_restore_with_expired_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/profile/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Invalid token."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.storage().set("authToken", "expired").unwrap();

    client.auth().restore().await;

    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.storage().get("authToken"), None);
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_restore_offline_removes_token() {
    let client = client(&unreachable_url());
    client.storage().set("authToken", "tok-1").unwrap();

    client.auth().restore().await;

    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.auth().token(), None);
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_restore_without_token_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let mut states = client.auth().subscribe();

    client.auth().restore().await;

    assert_eq!(*states.borrow_and_update(), AuthState::Anonymous);
    assert!(!client.auth().is_loading());
}

#[tokio::test]
async fn test_logout_offline_clears_immediately() {
    let client = client(&unreachable_url());
    client.storage().set("authToken", "tok-9").unwrap();
    client.auth().set_user(user(9));

    let notify = client.auth().logout();

    // Cleared before the server is contacted.
    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.storage().get("authToken"), None);

    notify.await;

    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.auth().token(), None);
}

#[tokio::test]
async fn test_logout_notifies_server_with_old_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout/"))
        .and(header("Authorization", "Token tok-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Logout successful"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.storage().set("authToken", "tok-4").unwrap();
    client.auth().set_user(user(4));

    client.auth().logout().await;

    assert!(!client.auth().is_authenticated());
    assert_eq!(client.auth().token(), None);
}

#[tokio::test]
async fn test_logout_server_error_is_swallowed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Logout failed"
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client.storage().set("authToken", "tok-4").unwrap();
    client.auth().set_user(user(4));

    client.auth().logout().await;

    assert_eq!(client.auth().state(), AuthState::Anonymous);
    assert_eq!(client.auth().last_error(), None);
}

#[tokio::test]
async fn test_verify_email_code_completes_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/verify-email-code/"))
        .and(body_json(json!({
            "email": "user11@example.com",
            "code": "123456",
            "verification_type": "signup"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Email verified successfully",
            "token": "tok-11",
            "user": user_json(11)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let verified = client
        .auth()
        .verify_email_code("user11@example.com", "123456", VerificationKind::Signup)
        .await
        .unwrap();

    assert_eq!(verified, Some(user(11)));
    assert_eq!(client.auth().token().as_deref(), Some("tok-11"));
    assert_eq!(client.auth().current_user(), Some(user(11)));
}

#[tokio::test]
async fn test_verify_email_code_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/verify-email-code/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Invalid or expired code"
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let result = client
        .auth()
        .verify_email_code("user11@example.com", "000000", VerificationKind::Signup)
        .await;

    assert!(result.is_err());
    assert_eq!(
        client.auth().last_error().as_deref(),
        Some("Invalid or expired code")
    );
    assert_eq!(client.auth().token(), None);
}

#[tokio::test]
async fn test_send_verification_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/send-verification-email/"))
        .and(body_json(json!({
            "email": "user11@example.com",
            "verification_type": "signup"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Verification email sent"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    client
        .auth()
        .send_verification_email("user11@example.com", VerificationKind::Signup)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_google_auth_sets_provider() {
    let mock_server = MockServer::start().await;

    let mut google_user = user_json(21);
    google_user["provider"] = json!("google");

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/google-auth/"))
        .and(body_json(json!({ "access_token": "google-credential" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Google authentication successful",
            "token": "tok-21",
            "user": google_user
        })))
        .mount(&mock_server)
        .await;

    let client = client(&api_url(&mock_server));
    let signed_in = client.auth().google_auth("google-credential").await.unwrap();

    assert_eq!(signed_in.provider.as_deref(), Some("google"));
    assert_eq!(client.auth().token().as_deref(), Some("tok-21"));
}

#[tokio::test]
async fn test_fetch_profile_requires_token() {
    let client = client(&unreachable_url());
    let result = client.auth().fetch_profile().await;
    assert!(matches!(result, Err(Error::Unauthenticated)));
}
