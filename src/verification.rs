//! Caller identity check run mid-call by the voice platform.
//!
//! The expected answer is the patient's stored security answer, or their
//! last name when none is on file. Unknown patients fail exactly like a
//! wrong answer so the result reveals nothing about which ids exist.

use serde::Serialize;

use crate::models::Patient;
use crate::store::{Store, StoreError};

pub const VERIFIED_MESSAGE: &str = "Identity verified";
pub const FAILED_MESSAGE: &str = "Verification failed. Please try again.";

/// Which stored value the spoken answer was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    SecurityAnswer,
    LastNameFallback,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityAnswer => "security_answer",
            Self::LastNameFallback => "last_name_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verified: bool,
    /// `None` when the patient could not be found.
    pub method: Option<VerificationMethod>,
}

impl Verification {
    pub fn message(&self) -> &'static str {
        if self.verified {
            VERIFIED_MESSAGE
        } else {
            FAILED_MESSAGE
        }
    }

    /// The voice platform substitutes this into its workflow as a string.
    pub fn variable(&self) -> &'static str {
        if self.verified {
            "true"
        } else {
            "false"
        }
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Compare a spoken answer with the patient's expected answer.
pub fn check_answer(patient: &Patient, provided: &str) -> Verification {
    let stored = patient
        .security_answer
        .as_deref()
        .filter(|a| !a.trim().is_empty());

    let (expected, method) = match stored {
        Some(answer) => (answer, VerificationMethod::SecurityAnswer),
        None => (patient.last_name.as_str(), VerificationMethod::LastNameFallback),
    };

    Verification {
        verified: normalize(expected) == normalize(provided),
        method: Some(method),
    }
}

/// Look the patient up and check the answer. Store failures propagate;
/// an unknown patient is reported as unverified.
pub async fn verify_identity(
    store: &dyn Store,
    patient_id: &str,
    answer: &str,
) -> Result<Verification, StoreError> {
    let outcome = match store.get_patient(patient_id).await? {
        Some(patient) => check_answer(&patient, answer),
        None => Verification {
            verified: false,
            method: None,
        },
    };

    tracing::info!(
        patient_id = "[REDACTED]",
        verified = outcome.verified,
        method = outcome.method.map_or("patient_not_found", |m| m.as_str()),
        "Identity verification result"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPatient;
    use crate::store::SqliteStore;
    use chrono::Utc;

    fn patient(last_name: &str, answer: Option<&str>) -> Patient {
        Patient {
            id: "p1".into(),
            first_name: "Jane".into(),
            last_name: last_name.into(),
            phone_e164: "+15551230000".into(),
            email: None,
            security_question: None,
            security_answer: answer.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stored_answer_matches_case_and_space_insensitively() {
        let p = patient("Doe", Some("Blue Whale"));
        let result = check_answer(&p, "  blue whale ");
        assert!(result.verified);
        assert_eq!(result.method, Some(VerificationMethod::SecurityAnswer));
        assert_eq!(result.variable(), "true");
        assert_eq!(result.message(), VERIFIED_MESSAGE);
    }

    #[test]
    fn stored_answer_takes_precedence_over_last_name() {
        let p = patient("Doe", Some("blue"));
        assert!(!check_answer(&p, "doe").verified);
    }

    #[test]
    fn last_name_is_the_fallback() {
        let p = patient(" Doe ", None);
        let result = check_answer(&p, "DOE");
        assert!(result.verified);
        assert_eq!(result.method, Some(VerificationMethod::LastNameFallback));
    }

    #[test]
    fn blank_stored_answer_counts_as_absent() {
        let p = patient("Doe", Some("   "));
        let result = check_answer(&p, "doe");
        assert!(result.verified);
        assert_eq!(result.method, Some(VerificationMethod::LastNameFallback));
    }

    #[test]
    fn mismatch_reports_failure_message() {
        let result = check_answer(&patient("Doe", None), "smith");
        assert!(!result.verified);
        assert_eq!(result.variable(), "false");
        assert_eq!(result.message(), FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_patient_is_unverified_not_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        let result = verify_identity(&store, "missing", "doe").await.unwrap();
        assert!(!result.verified);
        assert_eq!(result.method, None);
    }

    #[tokio::test]
    async fn verifies_against_stored_patient() {
        let store = SqliteStore::in_memory().unwrap();
        let created = store
            .insert_patient(NewPatient {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                phone_e164: "+15551230000".into(),
                security_answer: Some("Rex".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(verify_identity(&store, &created.id, "rex").await.unwrap().verified);
        assert!(!verify_identity(&store, &created.id, "doe").await.unwrap().verified);
    }
}
