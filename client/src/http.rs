//! HTTP client wrapper for the clinic backend
//!
//! Attaches the bearer token and clinic header from session storage to every
//! request. A 401 clears the stored session and comes back as
//! `ClientError::Unauthenticated`; deciding where to navigate is left to the
//! caller. Listeners registered with [`ApiClient::on_session_expired`] run on
//! every 401 so in-memory session state can follow.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::ApiConfig;
use crate::error::{ClientError, ClientResult};
use crate::storage::{lock, SessionStorage};

/// Header carrying the selected clinic id
pub const CLINIC_HEADER: &str = "X-Clinic-Id";

type ExpiryListener = Arc<dyn Fn() + Send + Sync>;

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    long_timeout: Duration,
    storage: SessionStorage,
    on_expired: Arc<Mutex<Vec<ExpiryListener>>>,
}

impl ApiClient {
    /// Create a new ApiClient; the base URL is fixed for the client's lifetime
    pub fn new(config: &ApiConfig, storage: SessionStorage) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            long_timeout: config.long_timeout(),
            storage,
            on_expired: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Run `listener` whenever the backend rejects the session with a 401.
    /// Shared by every clone of this client.
    pub fn on_session_expired(&self, listener: impl Fn() + Send + Sync + 'static) {
        lock(&self.on_expired).push(Arc::new(listener));
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.json(self.request(Method::GET, path)).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.json(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.json(self.request(Method::POST, path).json(body)).await
    }

    /// POST with a per-request timeout, for slow endpoints such as image analysis
    pub async fn post_with_timeout<T, B>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path).timeout(timeout).json(body);
        self.json(request).await
    }

    /// Timeout configured for long-running endpoints
    pub fn long_timeout(&self) -> Duration {
        self.long_timeout
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.json(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.json(self.request(Method::PATCH, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "API request");

        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = self.storage.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(clinic_id) = self.storage.clinic_id() {
            request = request.header(CLINIC_HEADER, clinic_id);
        }
        request
    }

    async fn execute(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected the session token, clearing stored session");
            if let Err(e) = self.storage.clear_session() {
                tracing::error!("Failed to clear stored session: {}", e);
            }
            let listeners = lock(&self.on_expired).clone();
            for listener in listeners {
                listener();
            }
            return Err(ClientError::Unauthenticated);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &body));
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    }
}

/// Decode a response body, unwrapping a `{ "data": ... }` envelope if the
/// payload itself does not match
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> ClientResult<T> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(e) => match value {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                let data = map.remove("data").unwrap_or_default();
                serde_json::from_value(data).map_err(Into::into)
            }
            _ => Err(e.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Clinic, PaginatedResponse};

    #[test]
    fn test_decode_plain_and_enveloped() {
        let plain: Clinic = decode_body(br#"{"_id": "c1", "name": "North"}"#).unwrap();
        assert_eq!(plain.id, "c1");

        let wrapped: Clinic =
            decode_body(br#"{"success": true, "data": {"_id": "c2", "name": "South"}}"#).unwrap();
        assert_eq!(wrapped.id, "c2");

        let page: PaginatedResponse<Clinic> =
            decode_body(br#"{"data": [{"_id": "c3", "name": "East"}]}"#).unwrap();
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_decode_failure() {
        let result: ClientResult<Clinic> = decode_body(br#"{"name": 5}"#);
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_url_joining() {
        let config = ApiConfig {
            base_url: "http://localhost:5000/api/".to_string(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config, SessionStorage::in_memory()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/patients"), "http://localhost:5000/api/patients");
        assert_eq!(client.url("patients/1"), "http://localhost:5000/api/patients/1");
    }
}
