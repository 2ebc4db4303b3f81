use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::Prescription;

/// Best-effort delivery of prescription events to the web app's
/// notification endpoint. Failures are logged and never reach the caller.
#[derive(Clone)]
pub struct NotificationService {
    client: Client,
    endpoint: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.notification_endpoint(),
        }
    }

    pub fn prescription_created_payload(prescription: &Prescription) -> Value {
        json!({
            "type": "prescription_created",
            "data": {
                "patientId": prescription.pid,
                "doctorId": prescription.did,
                "diagnosis": prescription.diagnosis,
                "medicines": prescription.medicines,
                "instructions": prescription.instructions,
            }
        })
    }

    /// Spawns the dispatch and returns immediately. Dropping the handle
    /// detaches the task.
    pub fn notify_prescription_created(&self, prescription: &Prescription) -> JoinHandle<()> {
        let payload = Self::prescription_created_payload(prescription);
        let prescription_id = prescription.prescription_id;
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let result = client.post(&endpoint).json(&payload).send().await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Notification sent for prescription {}", prescription_id);
                }
                Ok(response) => {
                    error!(
                        "Failed to send notification for prescription {}: HTTP {}",
                        prescription_id,
                        response.status()
                    );
                }
                Err(e) => {
                    error!("Failed to send notification for prescription {}: {}", prescription_id, e);
                }
            }
        })
    }
}
