//! WebAssembly module for the clinic client
//!
//! Exposes the pure parts of the client core to the browser:
//! - Role permission lookups
//! - Route access decisions
//! - Entity id validation
//! - Invoice totals

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::{invoice_total, AuthStatus, InvoiceLine, Role, RouteGuard};

/// Permission names granted to `role`; empty for unknown roles
#[wasm_bindgen]
pub fn role_permissions(role: &str) -> js_sys::Array {
    let names = role
        .parse::<Role>()
        .map(|r| r.permission_names())
        .unwrap_or_default();
    names.into_iter().map(JsValue::from).collect()
}

#[wasm_bindgen]
pub fn role_has_permission(role: &str, permission: &str) -> bool {
    role.parse::<Role>()
        .map(|r| shared::role_has_permission(r, permission))
        .unwrap_or(false)
}

/// Decide whether a page may render.
///
/// `allowed_roles_json` is a JSON array of role names; an empty array admits
/// any signed-in role. Returns `allow`, `redirect_to_login` or `access_denied`.
#[wasm_bindgen]
pub fn check_route_access(
    authenticated: bool,
    role: Option<String>,
    allowed_roles_json: &str,
) -> String {
    let allowed = match parse_allowed_roles(allowed_roles_json) {
        Ok(allowed) => allowed,
        Err(message) => {
            web_sys::console::warn_1(&JsValue::from_str(&message));
            return shared::GuardOutcome::AccessDenied.as_str().to_string();
        }
    };

    let status = if authenticated {
        AuthStatus::Authenticated
    } else {
        AuthStatus::Unauthenticated
    };
    let role = role.and_then(|r| r.parse::<Role>().ok());

    RouteGuard::roles(&allowed).check(status, role).as_str().to_string()
}

fn parse_allowed_roles(json: &str) -> Result<Vec<Role>, String> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = serde_json::from_str(json)
        .map_err(|e| format!("Invalid allowed roles JSON: {}", e))?;
    names
        .iter()
        .map(|name| name.parse::<Role>().map_err(|e| e.to_string()))
        .collect()
}

#[wasm_bindgen]
pub fn is_valid_entity_id(id: &str) -> bool {
    shared::is_valid_entity_id(id)
}

/// Sum of line totals including tax, as a decimal string
#[wasm_bindgen]
pub fn calculate_invoice_total(lines_json: &str) -> Result<String, JsValue> {
    invoice_total_from_json(lines_json)
        .map(|total| total.to_string())
        .map_err(|e| JsValue::from_str(&e))
}

fn invoice_total_from_json(lines_json: &str) -> Result<Decimal, String> {
    let lines: Vec<InvoiceLine> = serde_json::from_str(lines_json)
        .map_err(|e| format!("Invalid invoice lines JSON: {}", e))?;
    Ok(invoice_total(&lines))
}
