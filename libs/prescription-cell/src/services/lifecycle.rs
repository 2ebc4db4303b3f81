use tracing::{debug, warn};

use crate::models::{
    CreatePrescriptionRequest, Medicine, PrescriptionAction, PrescriptionError, PrescriptionState,
    UpdatePrescriptionRequest,
};

pub struct PrescriptionLifecycleService;

impl PrescriptionLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Actions a prescription in `state` accepts. Sending twice is allowed
    /// and only re-stamps `sent_at`; nothing but a repeat delete is accepted
    /// once deleted.
    pub fn allowed_actions(&self, state: PrescriptionState) -> &'static [PrescriptionAction] {
        match state {
            PrescriptionState::Draft | PrescriptionState::Sent => &[
                PrescriptionAction::Update,
                PrescriptionAction::Send,
                PrescriptionAction::Delete,
            ],
            PrescriptionState::Deleted => &[PrescriptionAction::Delete],
        }
    }

    /// Checks `action` against `state` and returns the resulting state.
    pub fn apply(
        &self,
        state: PrescriptionState,
        action: PrescriptionAction,
    ) -> Result<PrescriptionState, PrescriptionError> {
        if !self.allowed_actions(state).contains(&action) {
            warn!("Rejected prescription action {:?} in state {:?}", action, state);
            return Err(PrescriptionError::InvalidTransition { from: state, action });
        }

        let next = match action {
            PrescriptionAction::Update => state,
            PrescriptionAction::Send => PrescriptionState::Sent,
            PrescriptionAction::Delete => PrescriptionState::Deleted,
        };

        debug!("Prescription transition {:?} --{:?}--> {:?}", state, action, next);
        Ok(next)
    }

    pub fn validate_create(&self, request: &CreatePrescriptionRequest) -> Result<(), PrescriptionError> {
        if request.pid.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Patient ID is required".to_string()));
        }
        if request.did.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Doctor ID is required".to_string()));
        }
        self.validate_content(&request.diagnosis, &request.medicines)
    }

    pub fn validate_update(&self, request: &UpdatePrescriptionRequest) -> Result<(), PrescriptionError> {
        self.validate_content(&request.diagnosis, &request.medicines)
    }

    fn validate_content(&self, diagnosis: &str, medicines: &[Medicine]) -> Result<(), PrescriptionError> {
        if diagnosis.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Diagnosis is required".to_string()));
        }
        if medicines.is_empty() {
            return Err(PrescriptionError::ValidationError(
                "At least one medicine is required".to_string(),
            ));
        }

        for (index, medicine) in medicines.iter().enumerate() {
            if medicine.name.trim().is_empty() {
                return Err(PrescriptionError::ValidationError(format!(
                    "Medicine {} is missing a name",
                    index + 1
                )));
            }
            if medicine.dosage.trim().is_empty() {
                return Err(PrescriptionError::ValidationError(format!(
                    "Medicine '{}' is missing a dosage",
                    medicine.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for PrescriptionLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
