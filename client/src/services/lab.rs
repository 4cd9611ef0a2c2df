//! Lab test configuration services

use std::time::Duration;

use shared::{ListParams, TestCategory, TestCategoryInput, TurnaroundTime, TurnaroundTimeInput};

use crate::error::{ClientError, ClientResult};
use crate::query::minutes;
use crate::services::resource::{Resource, ResourceService};

pub struct TestCategories;

impl Resource for TestCategories {
    const NAME: &'static str = "test-categories";
    const PATH: &'static str = "/test-categories";
    const STALE_TIME: Duration = minutes(30);

    type Item = TestCategory;
    type Filter = ListParams;
    type Create = TestCategoryInput;
    type Update = TestCategoryInput;

    fn validate_create(input: &TestCategoryInput) -> ClientResult<()> {
        if input.name.trim().is_empty() {
            return Err(ClientError::validation("name", "Category name is required"));
        }
        Ok(())
    }
}

pub type TestCategoryService = ResourceService<TestCategories>;

pub struct TurnaroundTimes;

impl Resource for TurnaroundTimes {
    const NAME: &'static str = "turnaround-times";
    const PATH: &'static str = "/turnaround-times";
    const STALE_TIME: Duration = minutes(30);

    type Item = TurnaroundTime;
    type Filter = ListParams;
    type Create = TurnaroundTimeInput;
    type Update = TurnaroundTimeInput;

    fn validate_create(input: &TurnaroundTimeInput) -> ClientResult<()> {
        if input.duration_hours == 0 {
            return Err(ClientError::validation(
                "duration_hours",
                "Turnaround must be at least one hour",
            ));
        }
        Ok(())
    }
}

pub type TurnaroundTimeService = ResourceService<TurnaroundTimes>;
