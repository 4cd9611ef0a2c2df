//! HTTP client wrapper tests
//!
//! - bearer token and clinic header selection
//! - 401 handling clears the stored session
//! - status codes map onto error kinds

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clinic_client::{ClientError, SessionStorage};
use common::{token, FakeBackend, NORTH_CLINIC, PATIENT_ID, USER_ID};
use serde_json::Value;
use shared::{HealthStatus, Patient};

#[tokio::test]
async fn test_session_token_without_clinic() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let storage = SessionStorage::in_memory();
    let session_token = token(USER_ID, 3600);
    storage.set_token(session_token.clone()).unwrap();
    let api = backend.client(storage);

    let _: HealthStatus = api.get("/health").await.unwrap();

    let request = backend.last_request("GET /health").unwrap();
    assert_eq!(request.authorization, Some(format!("Bearer {}", session_token)));
    assert_eq!(request.clinic_id, None);
}

#[tokio::test]
async fn test_clinic_token_and_header_when_selected() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let storage = SessionStorage::in_memory();
    storage.set_token(token(USER_ID, 3600)).unwrap();
    let clinic_token = token("clinic-scoped", 3600);
    storage.set_clinic(NORTH_CLINIC, clinic_token.clone()).unwrap();
    let api = backend.client(storage);

    let _: Patient = api.get(&format!("/patients/{}", PATIENT_ID)).await.unwrap();

    let request = backend.last_request(&format!("GET /patients/{}", PATIENT_ID)).unwrap();
    assert_eq!(request.authorization, Some(format!("Bearer {}", clinic_token)));
    assert_eq!(request.clinic_id.as_deref(), Some(NORTH_CLINIC));
}

#[tokio::test]
async fn test_no_authorization_without_token() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let api = backend.client(SessionStorage::in_memory());

    let _: HealthStatus = api.get("/health").await.unwrap();

    assert_eq!(backend.last_request("GET /health").unwrap().authorization, None);
}

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let storage = SessionStorage::in_memory();
    storage.set_token(token(USER_ID, 3600)).unwrap();
    let api = backend.client(storage.clone());
    let expired = Arc::new(AtomicUsize::new(0));
    let counter = expired.clone();
    api.clone().on_session_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    backend.fail("GET /patients", 401);

    let result: Result<Value, _> = api.get("/patients").await;

    assert_eq!(result, Err(ClientError::Unauthenticated));
    assert_eq!(storage.token(), None);
    assert_eq!(storage.user(), None);
    assert_eq!(expired.load(Ordering::SeqCst), 1);

    // Other failures leave the listeners alone
    backend.fail("GET /patients", 500);
    let _: Result<Value, _> = api.get("/patients").await;
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let api = backend.client(SessionStorage::in_memory());

    let missing: Result<Value, _> = api.get("/no-such-route").await;
    assert!(matches!(missing, Err(ClientError::NotFound(_))));

    backend.fail("GET /health", 503);
    let unavailable: Result<Value, _> = api.get("/health").await;
    match unavailable {
        Err(ClientError::Server { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "forced 503");
        }
        other => panic!("expected server error, got {:?}", other),
    }

    backend.fail("GET /health", 403);
    let forbidden: Result<Value, _> = api.get("/health").await;
    assert_eq!(forbidden, Err(ClientError::Forbidden("forced 403".to_string())));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let backend = FakeBackend::start("doctor", &[]).await;
    let api = backend.client(SessionStorage::in_memory());
    backend.set_delay(Duration::from_millis(500));

    let result: Result<Value, _> = api
        .post_with_timeout("/medical-records/analyze-image", &serde_json::json!({}), Duration::from_millis(50))
        .await;

    assert_eq!(result, Err(ClientError::Timeout));
}
