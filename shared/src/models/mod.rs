//! Domain models for the clinic client

mod analytics;
mod appointment;
mod billing;
mod clinic;
mod inventory;
mod lab;
mod patient;
mod training;
mod user;

pub use analytics::*;
pub use appointment::*;
pub use billing::*;
pub use clinic::*;
pub use inventory::*;
pub use lab::*;
pub use patient::*;
pub use training::*;
pub use user::*;
