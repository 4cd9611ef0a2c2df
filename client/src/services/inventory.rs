//! Inventory and lead services

use std::time::Duration;

use shared::{
    CreateInventoryItemInput, CreateLeadInput, InventoryItem, Lead, ListParams,
    UpdateInventoryItemInput, UpdateLeadInput,
};

use validator::Validate;

use crate::error::{ClientError, ClientResult};
use crate::query::minutes;
use crate::services::resource::{Resource, ResourceService};

pub struct Inventory;

impl Resource for Inventory {
    const NAME: &'static str = "inventory";
    const PATH: &'static str = "/inventory";
    const STALE_TIME: Duration = minutes(10);

    type Item = InventoryItem;
    type Filter = ListParams;
    type Create = CreateInventoryItemInput;
    type Update = UpdateInventoryItemInput;

    fn validate_create(input: &CreateInventoryItemInput) -> ClientResult<()> {
        if input.name.trim().is_empty() {
            return Err(ClientError::validation("name", "Item name is required"));
        }
        if input.quantity < 0 || input.reorder_level < 0 {
            return Err(ClientError::validation(
                "quantity",
                "Quantities cannot be negative",
            ));
        }
        Ok(())
    }

    fn related_scopes() -> &'static [&'static str] {
        &["dashboard"]
    }
}

pub type InventoryService = ResourceService<Inventory>;

pub struct Leads;

impl Resource for Leads {
    const NAME: &'static str = "leads";
    const PATH: &'static str = "/leads";
    const STALE_TIME: Duration = minutes(5);

    type Item = Lead;
    type Filter = ListParams;
    type Create = CreateLeadInput;
    type Update = UpdateLeadInput;

    fn validate_create(input: &CreateLeadInput) -> ClientResult<()> {
        input.validate()?;
        Ok(())
    }
}

pub type LeadService = ResourceService<Leads>;
