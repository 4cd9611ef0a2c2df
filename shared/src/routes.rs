//! Route guards
//!
//! Pages declare whether they need a session and which global roles may see
//! them; the guard turns the current auth state into a routing decision.

use serde::{Deserialize, Serialize};

use crate::models::Role;

pub const LOGIN_ROUTE: &str = "/login";

/// Pages reachable without a session
pub const AUTH_ROUTES: &[&str] = &["/login", "/register", "/forgot-password", "/reset-password"];

/// Whether `path` is one of the authentication pages
pub fn is_auth_route(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    AUTH_ROUTES.iter().any(|r| *r == path)
}

/// Auth state as seen by a guard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Loading,
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardOutcome {
    Allow,
    /// Auth state still loading; render nothing yet
    Pending,
    RedirectToLogin,
    AccessDenied,
}

impl GuardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardOutcome::Allow => "allow",
            GuardOutcome::Pending => "pending",
            GuardOutcome::RedirectToLogin => "redirect_to_login",
            GuardOutcome::AccessDenied => "access_denied",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    pub requires_auth: bool,
    /// Empty means any signed-in role
    pub allowed_roles: Vec<Role>,
}

impl RouteGuard {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            allowed_roles: Vec::new(),
        }
    }

    pub fn roles(roles: &[Role]) -> Self {
        Self {
            requires_auth: true,
            allowed_roles: roles.to_vec(),
        }
    }

    pub fn check(&self, status: AuthStatus, role: Option<Role>) -> GuardOutcome {
        if !self.requires_auth {
            return GuardOutcome::Allow;
        }
        match status {
            AuthStatus::Loading => GuardOutcome::Pending,
            AuthStatus::Unauthenticated => GuardOutcome::RedirectToLogin,
            AuthStatus::Authenticated => match role {
                None => GuardOutcome::RedirectToLogin,
                Some(_) if self.allowed_roles.is_empty() => GuardOutcome::Allow,
                Some(role) if self.allowed_roles.contains(&role) => GuardOutcome::Allow,
                Some(_) => GuardOutcome::AccessDenied,
            },
        }
    }
}
