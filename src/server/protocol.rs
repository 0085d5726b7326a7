//! Wire envelopes for `/translate` and their validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HermodError, Result};
use crate::lang::validate_language_code;

/// Longest accepted source text, in characters.
const MAX_TEXT_LENGTH: usize = 10_000;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("valid UUID regex")
});

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$")
        .expect("valid timestamp regex")
});

/// Validate a UUID v4 string.
pub fn validate_uuid(uuid: &str) -> bool {
    uuid.len() == 36 && UUID_RE.is_match(uuid)
}

/// Validate an RFC 3339 timestamp string.
pub fn validate_timestamp(timestamp: &str) -> bool {
    TIMESTAMP_RE.is_match(timestamp)
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn current_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Inbound translation request.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    pub timestamp: String,
    pub uuid: String,
    pub from: String,
    pub to: String,
    pub text: String,
}

impl TranslateRequest {
    /// Field-level validation; the text itself is sanitized separately.
    pub fn validate(&self) -> Result<()> {
        if !validate_timestamp(&self.timestamp) {
            return Err(HermodError::Validation(format!(
                "invalid timestamp: {}",
                self.timestamp
            )));
        }
        if !validate_uuid(&self.uuid) {
            return Err(HermodError::Validation(format!(
                "invalid uuid: {}",
                self.uuid
            )));
        }
        if !validate_language_code(&self.from) {
            return Err(HermodError::Validation(format!(
                "invalid 'from' language code: {}",
                self.from
            )));
        }
        if !validate_language_code(&self.to) {
            return Err(HermodError::Validation(format!(
                "invalid 'to' language code: {}",
                self.to
            )));
        }
        if self.text.is_empty() {
            return Err(HermodError::Validation("text is empty".into()));
        }
        if self.text.chars().count() > MAX_TEXT_LENGTH {
            return Err(HermodError::Validation(format!(
                "text exceeds {MAX_TEXT_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Success response; `timestamp` and `uuid` echo the request verbatim.
#[derive(Debug, Serialize)]
pub struct TranslateResponse<'a> {
    pub timestamp: &'a str,
    pub uuid: &'a str,
    #[serde(rename = "translatedText")]
    pub translated_text: &'a str,
}

/// Error response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    #[serde(rename = "errorCode")]
    pub error_code: &'a str,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<&'a str>,
    pub timestamp: String,
}

impl<'a> ErrorResponse<'a> {
    pub fn new(error_code: &'a str, error_message: impl Into<String>, uuid: Option<&'a str>) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
            uuid,
            timestamp: current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> TranslateRequest {
        TranslateRequest {
            timestamp: "2025-06-01T12:00:00.000Z".into(),
            uuid: "9b2c7e1a-5f3d-4a6b-8c9d-0e1f2a3b4c5d".into(),
            from: "kor".into(),
            to: "eng".into(),
            text: "안녕하세요".into(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn uuid_must_be_version_4() {
        assert!(validate_uuid("9b2c7e1a-5f3d-4a6b-8c9d-0e1f2a3b4c5d"));
        assert!(validate_uuid("9B2C7E1A-5F3D-4A6B-8C9D-0E1F2A3B4C5D"));
        // version nibble is 1, not 4
        assert!(!validate_uuid("9b2c7e1a-5f3d-1a6b-8c9d-0e1f2a3b4c5d"));
        // variant nibble out of range
        assert!(!validate_uuid("9b2c7e1a-5f3d-4a6b-0c9d-0e1f2a3b4c5d"));
        assert!(!validate_uuid("not-a-uuid"));
    }

    #[test]
    fn timestamps_accept_rfc3339_variants() {
        assert!(validate_timestamp("2025-06-01T12:00:00Z"));
        assert!(validate_timestamp("2025-06-01T12:00:00.123Z"));
        assert!(validate_timestamp("2025-06-01T12:00:00+09:00"));
        assert!(!validate_timestamp("2025-06-01 12:00:00"));
        assert!(!validate_timestamp("yesterday"));
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let mut req = valid_request();
        req.from = "korean".into();
        assert!(req.validate().is_err());

        let mut req = valid_request();
        req.text = String::new();
        assert!(req.validate().is_err());

        let mut req = valid_request();
        req.text = "a".repeat(MAX_TEXT_LENGTH + 1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_uses_camel_case_field() {
        let json = serde_json::to_string(&TranslateResponse {
            timestamp: "t",
            uuid: "u",
            translated_text: "hello",
        })
        .unwrap();
        assert!(json.contains("\"translatedText\":\"hello\""));
    }

    #[test]
    fn error_response_omits_missing_uuid() {
        let json =
            serde_json::to_string(&ErrorResponse::new("VALIDATION_ERROR", "bad", None)).unwrap();
        assert!(!json.contains("uuid"));
        assert!(json.contains("\"errorCode\":\"VALIDATION_ERROR\""));
    }

    #[test]
    fn current_timestamp_validates() {
        assert!(validate_timestamp(&current_timestamp()));
    }
}
