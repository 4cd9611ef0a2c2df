//! Shared types and models for the clinic management client
//!
//! This crate contains the domain types, the global role table, route guards
//! and validation shared between the native client and the WASM module.

pub mod models;
pub mod routes;
pub mod types;
pub mod validation;

pub use models::*;
pub use routes::*;
pub use types::*;
pub use validation::*;
