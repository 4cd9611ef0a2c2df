//! Appointment scheduling service

use std::time::Duration;

use shared::{
    validate_entity_id, Appointment, AppointmentFilter, AppointmentStatus, AppointmentStatusInput,
    CreateAppointmentInput, UpdateAppointmentInput,
};

use crate::error::{ClientError, ClientResult};
use crate::query::minutes;
use crate::services::resource::{Resource, ResourceService};

pub struct Appointments;

impl Resource for Appointments {
    const NAME: &'static str = "appointments";
    const PATH: &'static str = "/appointments";
    const STALE_TIME: Duration = minutes(2);

    type Item = Appointment;
    type Filter = AppointmentFilter;
    type Create = CreateAppointmentInput;
    type Update = UpdateAppointmentInput;

    fn validate_create(input: &CreateAppointmentInput) -> ClientResult<()> {
        validate_entity_id(&input.patient_id)
            .map_err(|m| ClientError::validation("patient_id", m))?;
        if let Some(doctor_id) = &input.doctor_id {
            validate_entity_id(doctor_id).map_err(|m| ClientError::validation("doctor_id", m))?;
        }
        if input.duration_minutes == 0 {
            return Err(ClientError::validation(
                "duration_minutes",
                "Duration must be greater than zero",
            ));
        }
        Ok(())
    }

    fn related_scopes() -> &'static [&'static str] {
        &["dashboard"]
    }
}

pub type AppointmentService = ResourceService<Appointments>;

impl ResourceService<Appointments> {
    pub async fn update_status(&self, id: &str, status: AppointmentStatus) -> ClientResult<Appointment> {
        let path = format!("{}/status", Self::item_path(id)?);
        let updated = self
            .api()
            .patch(&path, &AppointmentStatusInput { status })
            .await?;
        tracing::info!(%id, ?status, "Appointment status changed");
        self.invalidate();
        Ok(updated)
    }
}
