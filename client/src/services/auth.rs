//! Authentication session service
//!
//! Holds the signed-in user, derives global permissions from the role table
//! and keeps the persisted token/user in step with the in-memory session.
//! State changes are published on a watch channel so dependents (the clinic
//! service, route guards) can react.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    AuthStatus, BackendUser, LoginInput, LoginResponse, RegisterInput, Role, SessionUser,
    SessionUserUpdate,
};
use tokio::sync::watch;
use validator::Validate;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub user: Option<SessionUser>,
}

impl AuthSnapshot {
    fn loading() -> Self {
        Self {
            status: AuthStatus::Loading,
            user: None,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: None,
        }
    }

    fn authenticated(user: SessionUser) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated && self.user.is_some()
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    state: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthService {
    /// Create a new AuthService in the `Loading` state
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::loading());
        let state = Arc::new(state);

        let expired = Arc::downgrade(&state);
        api.on_session_expired(move || {
            if let Some(state) = expired.upgrade() {
                if publish(&state, AuthSnapshot::unauthenticated()) {
                    tracing::info!("Session rejected by backend, signed out");
                }
            }
        });

        Self { api, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == AuthStatus::Loading
    }

    /// Restore the persisted session and validate its token with the backend
    pub async fn initialize(&self) {
        let storage = self.api.storage();
        match (storage.token(), storage.user()) {
            (Some(_), Some(user)) => {
                tracing::debug!("Validating persisted session for {}", user.email);
                self.state.send_modify(|s| s.user = Some(user));
                self.refresh_user().await;
            }
            _ => {
                if let Err(e) = storage.clear_session() {
                    tracing::warn!("Failed to clear partial session: {}", e);
                }
                self.publish(AuthSnapshot::unauthenticated());
            }
        }
    }

    /// Sign in; returns false on any failure so forms can show a generic error
    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.try_login(email, password).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Login failed for {}: {}", email, e);
                false
            }
        }
    }

    pub async fn try_login(&self, email: &str, password: &str) -> ClientResult<SessionUser> {
        let input = LoginInput {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.api.post("/auth/login", &input).await?;

        let user = SessionUser::from(response.user);
        self.api.storage().set_session(response.token, &user)?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        self.publish(AuthSnapshot::authenticated(user.clone()));
        Ok(user)
    }

    /// Create an account; the caller still has to `login` afterwards
    pub async fn register(&self, input: &RegisterInput) -> bool {
        match self.try_register(input).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Registration failed for {}: {}", input.email, e);
                false
            }
        }
    }

    pub async fn try_register(&self, input: &RegisterInput) -> ClientResult<()> {
        input.validate()?;
        let _: Value = self.api.post("/auth/register", input).await?;
        tracing::info!("Registered account for {}", input.email);
        Ok(())
    }

    /// Drop the session locally; no request is made
    pub fn logout(&self) {
        if let Err(e) = self.api.storage().clear_session() {
            tracing::error!("Failed to clear stored session on logout: {}", e);
        }
        tracing::info!("User logged out");
        self.publish(AuthSnapshot::unauthenticated());
    }

    /// Called after a request came back 401
    pub fn expire_session(&self) {
        if let Err(e) = self.api.storage().clear_session() {
            tracing::error!("Failed to clear expired session: {}", e);
        }
        if self.status() != AuthStatus::Unauthenticated {
            tracing::info!("Session expired");
        }
        self.publish(AuthSnapshot::unauthenticated());
    }

    /// Re-fetch the current user; any failure ends the session
    pub async fn refresh_user(&self) -> bool {
        match self.try_refresh_user().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Session refresh failed, signing out: {}", e);
                self.expire_session();
                false
            }
        }
    }

    async fn try_refresh_user(&self) -> ClientResult<SessionUser> {
        if self.api.storage().token().is_none() {
            return Err(ClientError::Unauthenticated);
        }

        let user: BackendUser = self.api.get("/users/me").await?;
        let user = SessionUser::from(user);
        self.api.storage().set_user(&user)?;
        self.publish(AuthSnapshot::authenticated(user.clone()));
        Ok(user)
    }

    /// Merge a partial update into the session and persist it; local only.
    /// Returns false when there is no session to update.
    pub fn update_user(&self, update: SessionUserUpdate) -> bool {
        let Some(mut user) = self.user() else {
            return false;
        };
        user.apply(update);

        if let Err(e) = self.api.storage().set_user(&user) {
            tracing::error!("Failed to persist user update: {}", e);
        }
        self.publish(AuthSnapshot::authenticated(user));
        true
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|u| u.has_permission(permission))
            .unwrap_or(false)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.has_any_role(&[role])
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|u| roles.contains(&u.role))
            .unwrap_or(false)
    }

    fn publish(&self, next: AuthSnapshot) {
        publish(&self.state, next);
    }
}

/// Replace the snapshot; returns whether it changed
fn publish(state: &watch::Sender<AuthSnapshot>, next: AuthSnapshot) -> bool {
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    })
}
