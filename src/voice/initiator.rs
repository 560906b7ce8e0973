use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::{
    CallMetadata, CallReference, Customer, HiddenVariables, StartCallRequest, TemplateVariables,
    VoiceClient, VoiceError, WorkflowOverrides, CALL_TYPE,
};
use crate::config::VoiceSettings;
use crate::models::Patient;

const DEFAULT_SECURITY_QUESTION: &str = "What is your last name?";

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("Patient has no callable E.164 phone number")]
    InvalidPhone,
    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Builds call requests for patients and submits them through a
/// [`VoiceClient`]. Constructed once at startup.
pub struct CallInitiator {
    client: Option<Arc<dyn VoiceClient>>,
    settings: VoiceSettings,
}

impl CallInitiator {
    /// `client` is `None` when no API key is configured.
    pub fn new(client: Option<Arc<dyn VoiceClient>>, settings: VoiceSettings) -> Self {
        Self { client, settings }
    }

    /// Build the request for `patient`. Fails before anything is sent when
    /// one of the three platform values is missing.
    pub fn build_request(
        &self,
        patient: &Patient,
        delivery_date: NaiveDate,
    ) -> Result<StartCallRequest, CallError> {
        let workflow_id = required(&self.settings.workflow_id, "VAPI_WORKFLOW_ID")?;
        let phone_number_id = required(&self.settings.phone_number_id, "VAPI_PHONE_NUMBER_ID")?;

        if !patient.has_callable_phone() {
            return Err(CallError::InvalidPhone);
        }

        let security_question_text = patient
            .security_question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_SECURITY_QUESTION)
            .to_string();

        let variable_values = TemplateVariables {
            pharmacy_name: self.settings.pharmacy_name.clone(),
            patient_first_name: patient.first_name.clone(),
            security_question_text,
            delivery_date: delivery_date.format("%Y-%m-%d").to_string(),
            verified: "false".into(),
            delivery_window: String::new(),
            med_change: String::new(),
            last_shipment_issue: String::new(),
            issue_note: String::new(),
            hidden: HiddenVariables {
                patient_id: patient.id.clone(),
            },
        };

        Ok(StartCallRequest {
            customer: Customer {
                number: patient.phone_e164.clone(),
            },
            phone_number_id,
            workflow_id,
            workflow_overrides: WorkflowOverrides { variable_values },
            metadata: CallMetadata {
                patient_id: patient.id.clone(),
                call_type: CALL_TYPE.into(),
            },
        })
    }

    /// Start a delivery-confirmation call to `patient`.
    pub async fn place_call(&self, patient: &Patient) -> Result<CallReference, CallError> {
        let client = match (&self.client, &self.settings.api_key) {
            (Some(client), Some(_)) => client,
            _ => return Err(CallError::NotConfigured("VAPI_API_KEY")),
        };
        let request = self.build_request(patient, Utc::now().date_naive())?;

        tracing::info!(patient_id = "[REDACTED]", "Starting voice call");
        let call = client.start_call(&request).await?;
        tracing::info!(call_id = %call.id, "Voice call started");
        Ok(call)
    }
}

fn required(value: &Option<String>, key: &'static str) -> Result<String, CallError> {
    value.clone().ok_or(CallError::NotConfigured(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{jane_patient, RecordingVoice};

    fn configured() -> VoiceSettings {
        VoiceSettings {
            api_key: Some("vapi-key".into()),
            workflow_id: Some("wf-1".into()),
            phone_number_id: Some("pn-1".into()),
            ..Default::default()
        }
    }

    fn initiator(settings: VoiceSettings) -> (CallInitiator, Arc<RecordingVoice>) {
        let voice = Arc::new(RecordingVoice::default());
        (CallInitiator::new(Some(voice.clone()), settings), voice)
    }

    #[tokio::test]
    async fn template_variables_carry_first_name_only() {
        let (initiator, voice) = initiator(configured());
        let call = initiator.place_call(&jane_patient()).await.unwrap();
        assert_eq!(call.id, "call-1");

        let sent = voice.requests();
        assert_eq!(sent.len(), 1);
        let vars = serde_json::to_value(&sent[0].workflow_overrides.variable_values).unwrap();
        let rendered = vars.to_string();

        assert_eq!(vars["patient_first_name"], "Jane");
        assert_eq!(vars["patientId"], "p1");
        assert!(!rendered.contains("Doe"));
        assert!(!rendered.contains("+15551230000"));
        assert_eq!(sent[0].customer.number, "+15551230000");
    }

    #[test]
    fn request_has_wire_field_names() {
        let (initiator, _) = initiator(configured());
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let request = initiator.build_request(&jane_patient(), date).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["phoneNumberId"], "pn-1");
        assert_eq!(json["workflowId"], "wf-1");
        assert_eq!(json["metadata"]["patientId"], "p1");
        assert_eq!(json["metadata"]["callType"], "pharmacy_delivery");

        let vars = &json["workflowOverrides"]["variableValues"];
        assert_eq!(vars["pharmacy_name"], "MedMe Pharmacy");
        assert_eq!(vars["delivery_date"], "2025-03-14");
        assert_eq!(vars["security_question_text"], "What is your last name?");
        assert_eq!(vars["verified"], "false");
        assert_eq!(vars["delivery_window"], "");
        assert!(vars.get("hidden").is_none());
    }

    #[test]
    fn stored_security_question_is_used() {
        let (initiator, _) = initiator(configured());
        let mut patient = jane_patient();
        patient.security_question = Some("First pet's name?".into());
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let request = initiator.build_request(&patient, date).unwrap();
        assert_eq!(
            request.workflow_overrides.variable_values.security_question_text,
            "First pet's name?"
        );
    }

    #[tokio::test]
    async fn each_missing_config_value_blocks_the_call() {
        let cases = [
            (VoiceSettings { api_key: None, ..configured() }, "VAPI_API_KEY"),
            (VoiceSettings { workflow_id: None, ..configured() }, "VAPI_WORKFLOW_ID"),
            (VoiceSettings { phone_number_id: None, ..configured() }, "VAPI_PHONE_NUMBER_ID"),
        ];

        for (settings, key) in cases {
            let (initiator, voice) = initiator(settings);
            match initiator.place_call(&jane_patient()).await {
                Err(CallError::NotConfigured(missing)) => assert_eq!(missing, key),
                other => panic!("expected missing {key}, got {other:?}"),
            }
            assert!(voice.requests().is_empty());
        }
    }

    #[tokio::test]
    async fn missing_client_is_a_config_error() {
        let initiator = CallInitiator::new(None, configured());
        assert!(matches!(
            initiator.place_call(&jane_patient()).await,
            Err(CallError::NotConfigured("VAPI_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn uncallable_phone_is_rejected_before_sending() {
        let (initiator, voice) = initiator(configured());
        let mut patient = jane_patient();
        patient.phone_e164 = "555-0100".into();

        assert!(matches!(
            initiator.place_call(&patient).await,
            Err(CallError::InvalidPhone)
        ));
        assert!(voice.requests().is_empty());
    }
}
