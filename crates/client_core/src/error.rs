use shared::{
    domain::{RecordId, Role},
    error::{ApiException, ErrorCode, FieldError},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Validation,
    Auth,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("role `{0}` is not allowed to modify records")]
    WriteNotPermitted(Role),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend rejected request with status {status}: {message}")]
    Rejected {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Vec<FieldError>,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("unknown sort field `{field}` for {resource}")]
    UnknownSortField {
        resource: &'static str,
        field: String,
    },
    #[error("record {0} is not on the current page")]
    NotInPage(RecordId),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("credential storage failed: {0:#}")]
    Storage(anyhow::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    pub fn from_response(status: u16, raw_body: &str) -> Self {
        let exception = ApiException::from_response(status, raw_body);
        match exception.code {
            ErrorCode::Validation => Self::Validation {
                message: exception.message,
                field_errors: exception.field_errors,
            },
            code => Self::Rejected {
                status,
                code,
                message: exception.message,
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotSignedIn | Self::WriteNotPermitted(_) => ErrorCategory::Auth,
            Self::Rejected {
                code: ErrorCode::Unauthorized | ErrorCode::Forbidden,
                ..
            } => ErrorCategory::Auth,
            Self::Validation { .. } | Self::UnknownSortField { .. } | Self::NotInPage(_) => {
                ErrorCategory::Validation
            }
            Self::Network(_)
            | Self::Rejected { .. }
            | Self::Decode(_)
            | Self::InvalidBaseUrl(_)
            | Self::Storage(_) => ErrorCategory::Network,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprocessable_body_becomes_validation_error() {
        let err = ClientError::from_response(
            422,
            r#"{"errors":[{"field":"shortName","message":"too long"}]}"#,
        );
        match &err {
            ClientError::Validation { field_errors, .. } => {
                assert_eq!(field_errors[0].field, "shortName");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn expired_token_is_classified_as_auth() {
        let err = ClientError::from_response(401, "");
        assert!(err.requires_reauth());
    }

    #[test]
    fn server_fault_is_classified_as_network() {
        let err = ClientError::from_response(503, "maintenance");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(
            err.to_string(),
            "backend rejected request with status 503: maintenance"
        );
    }
}
