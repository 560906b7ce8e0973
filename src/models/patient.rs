use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `+`, a non-zero country digit, then up to 14 more digits.
static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"));

/// Whether `phone` is an E.164 number (no spaces or punctuation).
pub fn is_e164(phone: &str) -> bool {
    E164.is_match(phone)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_e164: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub security_question: Option<String>,
    /// Read for identity checks only; never written into a response.
    #[serde(default, skip_serializing)]
    pub security_answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// A patient can only be dialled with an E.164 number on file.
    pub fn has_callable_phone(&self) -> bool {
        is_e164(&self.phone_e164)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("phone_e164 must be an E.164 number such as +15551230000")]
    InvalidPhone,
    #[error("email is not a valid address")]
    InvalidEmail,
}

/// Insert form for a patient. Optional fields default to null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_e164: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_answer: Option<String>,
}

impl NewPatient {
    /// Trim every field, turn blank optionals into `None`, and check the
    /// required fields and phone format.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let required = |value: String, field: &'static str| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(ValidationError::MissingField(field))
            } else {
                Ok(value)
            }
        };
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let first_name = required(self.first_name, "first_name")?;
        let last_name = required(self.last_name, "last_name")?;
        let phone_e164 = required(self.phone_e164, "phone_e164")?;
        if !is_e164(&phone_e164) {
            return Err(ValidationError::InvalidPhone);
        }

        let email = optional(self.email);
        if let Some(email) = &email {
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed {
                return Err(ValidationError::InvalidEmail);
            }
        }

        Ok(Self {
            first_name,
            last_name,
            phone_e164,
            email,
            security_question: optional(self.security_question),
            security_answer: optional(self.security_answer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> NewPatient {
        NewPatient {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone_e164: "+15551230000".into(),
            ..Default::default()
        }
    }

    #[test]
    fn e164_accepts_plus_and_digits_only() {
        assert!(is_e164("+15551230000"));
        assert!(is_e164("+447911123456"));
        assert!(!is_e164("15551230000"));
        assert!(!is_e164("+0555123"));
        assert!(!is_e164("+1 555 123 0000"));
        assert!(!is_e164("+1234567890123456"));
    }

    #[test]
    fn validated_trims_and_nulls_blank_optionals() {
        let input = NewPatient {
            first_name: "  Jane ".into(),
            email: Some("   ".into()),
            security_answer: Some(" blue ".into()),
            ..jane()
        };
        let clean = input.validated().unwrap();
        assert_eq!(clean.first_name, "Jane");
        assert_eq!(clean.email, None);
        assert_eq!(clean.security_question, None);
        assert_eq!(clean.security_answer.as_deref(), Some("blue"));
    }

    #[test]
    fn validated_reports_the_missing_field() {
        let err = NewPatient {
            last_name: "".into(),
            ..jane()
        }
        .validated()
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("last_name"));
        assert_eq!(err.to_string(), "last_name is required");
    }

    #[test]
    fn validated_rejects_malformed_phone_and_email() {
        let phone = NewPatient {
            phone_e164: "555-1230".into(),
            ..jane()
        };
        assert_eq!(phone.validated(), Err(ValidationError::InvalidPhone));

        let email = NewPatient {
            email: Some("jane.example.com".into()),
            ..jane()
        };
        assert_eq!(email.validated(), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn security_answer_never_serializes() {
        let patient = Patient {
            id: "p1".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone_e164: "+15551230000".into(),
            email: None,
            security_question: Some("Favourite colour?".into()),
            security_answer: Some("blue".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&patient).unwrap();
        assert!(json.get("security_answer").is_none());
        assert_eq!(json["security_question"], "Favourite colour?");
    }
}
