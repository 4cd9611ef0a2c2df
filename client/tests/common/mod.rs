//! In-process fake of the clinic backend for integration tests
//!
//! Serves canned JSON for the endpoints the client uses, counts hits per
//! route and records the auth headers of every request. Individual routes
//! can be forced to fail.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use clinic_client::config::ApiConfig;
use clinic_client::{ApiClient, SessionStorage};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const USER_ID: &str = "64b7f0c2a1e4d3b2c1a09f01";
pub const NORTH_CLINIC: &str = "64b7f0c2a1e4d3b2c1a0c001";
pub const SOUTH_CLINIC: &str = "64b7f0c2a1e4d3b2c1a0c002";
pub const PATIENT_ID: &str = "64b7f0c2a1e4d3b2c1a0a001";
pub const WRONG_PASSWORD: &str = "wrong-password";

/// A signed token expiring `offset_secs` from now
pub fn token(subject: &str, offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    encode(
        &Header::default(),
        &json!({ "sub": subject, "exp": exp }),
        &EncodingKey::from_secret(b"fake-backend-secret"),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub route: String,
    pub authorization: Option<String>,
    pub clinic_id: Option<String>,
}

#[derive(Clone)]
struct Override {
    status: StatusCode,
    body: Value,
    remaining: Option<usize>,
}

struct FakeState {
    role: Mutex<String>,
    clinics: Mutex<Vec<(String, String)>>,
    hits: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<RecordedRequest>>,
    overrides: Mutex<HashMap<String, Override>>,
    delay: Mutex<Duration>,
}

pub struct FakeBackend {
    pub base_url: String,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Start a backend whose user has `role` and belongs to the given clinics
    pub async fn start(role: &str, clinics: &[(&str, &str)]) -> Self {
        let state = Arc::new(FakeState {
            role: Mutex::new(role.to_string()),
            clinics: Mutex::new(
                clinics
                    .iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
            ),
            hits: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            overrides: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
            handle,
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            timeout_secs: 5,
            long_timeout_secs: 10,
        }
    }

    pub fn client(&self, storage: SessionStorage) -> ApiClient {
        ApiClient::new(&self.api_config(), storage).unwrap()
    }

    /// Number of requests seen for e.g. `"GET /user/clinics"`
    pub fn hits(&self, route: &str) -> usize {
        self.state.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self, route: &str) -> Option<RecordedRequest> {
        self.requests().into_iter().rev().find(|r| r.route == route)
    }

    /// Answer `route` with `status` until cleared
    pub fn fail(&self, route: &str, status: u16) {
        self.respond(route, status, json!({ "message": format!("forced {}", status) }), None);
    }

    /// Answer `route` with `status` for the next `times` requests only
    pub fn fail_times(&self, route: &str, status: u16, times: usize) {
        self.respond(
            route,
            status,
            json!({ "message": format!("forced {}", status) }),
            Some(times),
        );
    }

    pub fn respond(&self, route: &str, status: u16, body: Value, times: Option<usize>) {
        self.state.overrides.lock().unwrap().insert(
            route.to_string(),
            Override {
                status: StatusCode::from_u16(status).unwrap(),
                body,
                remaining: times,
            },
        );
    }

    pub fn clear_failures(&self) {
        self.state.overrides.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn set_role(&self, role: &str) {
        *self.state.role.lock().unwrap() = role.to_string();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/api").to_string();
    let route = format!("{} {}", method, path);

    *state.hits.lock().unwrap().entry(route.clone()).or_default() += 1;
    let clinic_header = header(&headers, "x-clinic-id");
    state.requests.lock().unwrap().push(RecordedRequest {
        route: route.clone(),
        authorization: header(&headers, "authorization"),
        clinic_id: clinic_header.clone(),
    });

    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if let Some(forced) = take_override(&state, &route) {
        return (forced.status, Json(forced.body)).into_response();
    }

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let role = state.role.lock().unwrap().clone();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["auth", "login"]) => {
            if body["password"] == WRONG_PASSWORD {
                return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
            }
            let email = body["email"].as_str().unwrap_or("dana@clinic.test");
            ok(json!({ "token": token(USER_ID, 3600), "user": user(email, &role) }))
        }
        ("POST", ["auth", "register"]) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Account created" })),
        )
            .into_response(),
        ("GET", ["users", "me"]) => ok(user("dana@clinic.test", &role)),
        ("GET", ["user", "clinics"]) => {
            let clinics: Vec<Value> = state
                .clinics
                .lock()
                .unwrap()
                .iter()
                .map(|(id, name)| {
                    json!({
                        "clinic": clinic(id, name),
                        "role": "admin",
                        "permissions": ["manage_patients"],
                        "is_active": true
                    })
                })
                .collect();
            ok(json!(clinics))
        }
        ("POST", ["user", "select-clinic"]) => {
            let clinic_id = body["clinic_id"].as_str().unwrap_or_default();
            match find_clinic(&state, clinic_id) {
                Some(name) => ok(json!({
                    "token": token(USER_ID, 3600),
                    "clinic": clinic(clinic_id, &name),
                    "role": "admin",
                    "permissions": ["manage_patients", "view_reports"]
                })),
                None => error(StatusCode::FORBIDDEN, "Not a member of this clinic"),
            }
        }
        ("POST", ["user", "clear-clinic"]) => ok(json!({ "token": token(USER_ID, 3600) })),
        ("GET", ["user", "current-clinic"]) => {
            let clinic_id = clinic_header.unwrap_or_default();
            match find_clinic(&state, &clinic_id) {
                Some(name) => ok(json!({
                    "success": true,
                    "data": {
                        "clinic": clinic(&clinic_id, &name),
                        "role": "admin",
                        "permissions": ["manage_patients", "view_reports"]
                    }
                })),
                None => error(StatusCode::NOT_FOUND, "Clinic not found"),
            }
        }
        ("GET", ["patients"]) => {
            let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
            let limit: u32 = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
            ok(json!({
                "data": [patient(PATIENT_ID, &format!("Page{}", page))],
                "pagination": { "page": page, "limit": limit, "total": 21, "pages": 3 }
            }))
        }
        ("GET", ["patients", id]) => ok(patient(id, "Ada")),
        ("POST", ["patients"]) => {
            let first_name = body["first_name"].as_str().unwrap_or("New");
            (StatusCode::CREATED, Json(patient(PATIENT_ID, first_name))).into_response()
        }
        ("PUT", ["patients", id]) => {
            let first_name = body["first_name"].as_str().unwrap_or("Ada");
            ok(patient(id, first_name))
        }
        ("DELETE", ["patients", _]) => StatusCode::NO_CONTENT.into_response(),
        ("PATCH", ["appointments", id, "status"]) => ok(json!({
            "_id": id,
            "patient_id": PATIENT_ID,
            "appointment_date": "2026-03-02T09:30:00Z",
            "status": body["status"],
        })),
        ("POST", ["medical-records", "analyze-image"]) => ok(json!({
            "findings": ["No abnormality detected"],
            "confidence": 0.92,
        })),
        ("GET", ["training", "progress"]) => ok(json!({
            "user_id": USER_ID,
            "modules": [
                { "module_id": "hipaa", "title": "Privacy basics", "completed": true },
                { "module_id": "cpr", "title": "CPR refresher", "completed": false }
            ]
        })),
        ("POST", ["training", "complete-module"]) => ok(json!({ "success": true })),
        ("GET", ["dashboard", "overview"]) => {
            let served = *state
                .hits
                .lock()
                .unwrap()
                .get("GET /dashboard/overview")
                .unwrap_or(&0);
            ok(json!({
                "total_patients": served,
                "appointments_today": 4,
                "pending_invoices": 2,
                "revenue_this_month": "1250.50",
                "low_stock_items": 1
            }))
        }
        ("GET", ["health"]) => ok(json!({ "status": "ok", "version": "1.4.0" })),
        _ => error(StatusCode::NOT_FOUND, "Route not found"),
    }
}

fn take_override(state: &FakeState, route: &str) -> Option<Override> {
    let mut overrides = state.overrides.lock().unwrap();
    let forced = overrides.get_mut(route)?;
    let result = forced.clone();
    match forced.remaining.as_mut() {
        Some(0) => {
            overrides.remove(route);
            return None;
        }
        Some(n) => *n -= 1,
        None => {}
    }
    Some(result)
}

fn find_clinic(state: &FakeState, clinic_id: &str) -> Option<String> {
    state
        .clinics
        .lock()
        .unwrap()
        .iter()
        .find(|(id, _)| id == clinic_id)
        .map(|(_, name)| name.clone())
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn ok(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn user(email: &str, role: &str) -> Value {
    json!({
        "_id": USER_ID,
        "email": email,
        "first_name": "Dana",
        "last_name": "Reyes",
        "role": role,
        "created_at": "2025-01-10T08:00:00Z",
        "updated_at": "2025-06-01T12:00:00Z"
    })
}

fn clinic(id: &str, name: &str) -> Value {
    json!({
        "_id": id,
        "name": name,
        "address": { "street": "1 Main St", "city": "Springfield" },
        "phone": "+15550100"
    })
}

fn patient(id: &str, first_name: &str) -> Value {
    json!({
        "_id": id,
        "first_name": first_name,
        "last_name": "Lovelace",
        "email": "ada@example.com"
    })
}
