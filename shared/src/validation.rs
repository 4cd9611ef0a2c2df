//! Validation utilities for the clinic client
//!
//! Checks that run locally before a request is sent, so obviously bad input is
//! reported without a round trip.

use uuid::Uuid;

// ============================================================================
// Identifier Validations
// ============================================================================

/// Validate a backend entity identifier.
///
/// The backend issues either 24-character hex document ids or UUIDs.
pub fn validate_entity_id(id: &str) -> Result<(), &'static str> {
    let id = id.trim();
    if id.is_empty() {
        return Err("Identifier is required");
    }
    if matches!(id, "undefined" | "null" | "[object Object]") {
        return Err("Identifier is malformed");
    }
    if is_object_id(id) || Uuid::parse_str(id).is_ok() {
        return Ok(());
    }
    Err("Identifier is malformed")
}

fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_valid_entity_id(id: &str) -> bool {
    validate_entity_id(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_object_ids_are_valid(id in "[0-9a-fA-F]{24}") {
            prop_assert!(is_valid_entity_id(&id));
        }

        #[test]
        fn prop_truncated_ids_are_rejected(id in "[0-9a-f]{1,23}") {
            prop_assert!(!is_valid_entity_id(&id));
        }
    }

    #[test]
    fn test_entity_ids() {
        assert!(validate_entity_id("64f1a2b3c4d5e6f7a8b9c0d1").is_ok());
        assert!(validate_entity_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_entity_id("").is_err());
        assert!(validate_entity_id("undefined").is_err());
        assert!(validate_entity_id("64f1a2b3c4d5e6f7a8b9c0d").is_err());
        assert!(validate_entity_id("../etc/passwd").is_err());
    }
}
