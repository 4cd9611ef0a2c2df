//! Patient and medical record services

use std::time::Duration;

use shared::{
    validate_entity_id, CreateMedicalRecordInput, CreatePatientInput, ImageAnalysisInput,
    ImageAnalysisResult, ListParams, MedicalRecord, MedicalRecordFilter, Patient,
    UpdateMedicalRecordInput, UpdatePatientInput,
};
use validator::Validate;

use crate::error::{ClientError, ClientResult};
use crate::query::minutes;
use crate::services::resource::{Resource, ResourceService};

pub struct Patients;

impl Resource for Patients {
    const NAME: &'static str = "patients";
    const PATH: &'static str = "/patients";
    const STALE_TIME: Duration = minutes(5);

    type Item = Patient;
    type Filter = ListParams;
    type Create = CreatePatientInput;
    type Update = UpdatePatientInput;

    fn validate_create(input: &CreatePatientInput) -> ClientResult<()> {
        input.validate()?;
        Ok(())
    }
}

pub type PatientService = ResourceService<Patients>;

pub struct MedicalRecords;

impl Resource for MedicalRecords {
    const NAME: &'static str = "medical-records";
    const PATH: &'static str = "/medical-records";
    const STALE_TIME: Duration = minutes(5);

    type Item = MedicalRecord;
    type Filter = MedicalRecordFilter;
    type Create = CreateMedicalRecordInput;
    type Update = UpdateMedicalRecordInput;

    fn validate_create(input: &CreateMedicalRecordInput) -> ClientResult<()> {
        validate_entity_id(&input.patient_id)
            .map_err(|m| ClientError::validation("patient_id", m))
    }
}

pub type MedicalRecordService = ResourceService<MedicalRecords>;

impl ResourceService<MedicalRecords> {
    /// Run AI image analysis; uses the long request timeout
    pub async fn analyze_image(&self, input: &ImageAnalysisInput) -> ClientResult<ImageAnalysisResult> {
        validate_entity_id(&input.patient_id)
            .map_err(|m| ClientError::validation("patient_id", m))?;

        let api = self.api();
        let result: ImageAnalysisResult = api
            .post_with_timeout("/medical-records/analyze-image", input, api.long_timeout())
            .await?;
        tracing::info!(
            patient_id = %input.patient_id,
            findings = result.findings.len(),
            "Image analysis complete"
        );
        self.invalidate();
        Ok(result)
    }
}
