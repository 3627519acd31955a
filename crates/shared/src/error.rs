use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(alias = "defaultMessage")]
    pub message: String,
}

/// Error body as the backend reports it. Every key is optional because the
/// backend emits several shapes depending on which layer rejected the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "fieldErrors")]
    pub errors: Vec<FieldError>,
}

impl ApiErrorBody {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            message: (!raw.trim().is_empty()).then(|| raw.trim().to_string()),
            errors: Vec::new(),
        })
    }

    pub fn summary(&self) -> Option<String> {
        if !self.errors.is_empty() {
            let joined = self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Some(joined);
        }
        self.message.clone()
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
    pub field_errors: Vec<FieldError>,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    pub fn from_response(status: u16, raw_body: &str) -> Self {
        let body = ApiErrorBody::parse(raw_body);
        let message = body
            .summary()
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self {
            code: ErrorCode::from_status(status),
            message,
            field_errors: body.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spring_style_field_errors() {
        let raw = r#"{"message":"Validation failed","errors":[{"field":"name","defaultMessage":"must not be blank"}]}"#;
        let err = ApiException::from_response(400, raw);
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.field_errors.len(), 1);
        assert_eq!(err.message, "name: must not be blank");
    }

    #[test]
    fn keeps_plain_text_bodies_as_message() {
        let err = ApiException::from_response(500, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        let err = ApiException::from_response(404, "");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "request failed with status 404");
    }
}
