//! RFC 9457 problem responses for access errors.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use resource_gate_sdk::{AccessError, FieldViolation};
use serde::{Deserialize, Serialize};

pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Handler result; errors render as problem responses.
pub type ApiResult<T> = Result<T, Problem>;

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// Problem details body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    pub detail: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldViolation>>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            code: String::new(),
            errors: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_errors(mut self, errors: Vec<FieldViolation>) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

/// Maps an access error to its problem body.
///
/// Forbidden never says which check failed; storage and internal details
/// are logged, not returned.
pub fn access_error_to_problem(e: &AccessError) -> Problem {
    match e {
        AccessError::AuthenticationRequired => {
            Problem::new(StatusCode::UNAUTHORIZED, "Unauthorized", e.to_string())
                .with_code("AUTHENTICATION_REQUIRED")
        }
        AccessError::Forbidden => {
            Problem::new(StatusCode::FORBIDDEN, "Forbidden", e.to_string()).with_code("FORBIDDEN")
        }
        AccessError::ResourceNotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Model Not Found", e.to_string())
                .with_code("MODEL_NOT_FOUND")
        }
        AccessError::RecordNotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Not Found", e.to_string())
                .with_code("RECORD_NOT_FOUND")
        }
        AccessError::ValidationFailed { violations } => Problem::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation Failed",
            e.to_string(),
        )
        .with_code("VALIDATION_FAILED")
        .with_errors(violations.clone()),
        AccessError::Storage(_) | AccessError::Internal(_) => {
            tracing::error!(error = %e, "Internal error while serving resource request");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An internal error occurred",
            )
            .with_code("INTERNAL")
        }
    }
}

impl From<AccessError> for Problem {
    fn from(e: AccessError) -> Self {
        access_error_to_problem(&e)
    }
}
