use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// RFC 9457 Problem Details for HTTP APIs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    title = "Problem",
    description = "RFC 9457 Problem Details for HTTP APIs"
)]
pub struct Problem {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// The HTTP status code for this occurrence of the problem.
    pub status: u16,
    /// A human-readable explanation specific to this occurrence.
    pub detail: String,
    /// The request path that produced the problem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
    /// Stable machine-readable error code, e.g. `USERS_NOT_FOUND`.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Per-field validation errors for 4xx problems.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(title = "ValidationError")]
pub struct ValidationError {
    pub detail: String,
    /// JSON Pointer to the invalid location (e.g., "/email").
    pub pointer: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            request_id: None,
            errors: None,
        }
    }

    /// Title defaults to the canonical reason phrase of `status`.
    pub fn from_status(
        status: StatusCode,
        code: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let title = status.canonical_reason().unwrap_or("Error");
        Self::new(status, title, detail).with_code(code)
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<ValidationError>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Axum response wrapper that renders `Problem` with its status and content type.
#[derive(Debug, Clone)]
pub struct ProblemResponse(pub Problem);

impl From<Problem> for ProblemResponse {
    fn from(p: Problem) -> Self {
        Self(p)
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = axum::Json(self.0).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

pub fn bad_request(code: &str, detail: impl Into<String>) -> ProblemResponse {
    Problem::from_status(StatusCode::BAD_REQUEST, code, detail).into()
}

pub fn not_found(code: &str, detail: impl Into<String>) -> ProblemResponse {
    Problem::from_status(StatusCode::NOT_FOUND, code, detail).into()
}

pub fn conflict(code: &str, detail: impl Into<String>) -> ProblemResponse {
    Problem::from_status(StatusCode::CONFLICT, code, detail).into()
}

pub fn internal_error(detail: impl Into<String>) -> ProblemResponse {
    Problem::from_status(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", detail).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = bad_request("USERS_VALIDATION", "invalid payload").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let ct = resp
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert_eq!(ct, APPLICATION_PROBLEM_JSON);
    }

    #[test]
    fn builder_and_wire_shape() {
        let p = Problem::from_status(StatusCode::CONFLICT, "USERS_EMAIL_CONFLICT", "taken")
            .with_instance("/users")
            .with_request_id("req-1")
            .with_errors(vec![ValidationError {
                detail: "already registered".into(),
                pointer: "/email".into(),
            }]);
        assert_eq!(p.title, "Conflict");

        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["type"], "about:blank");
        assert_eq!(v["status"], 409);
        assert_eq!(v["code"], "USERS_EMAIL_CONFLICT");
        assert_eq!(v["requestId"], "req-1");
        assert_eq!(v["errors"][0]["pointer"], "/email");
    }

    #[test]
    fn empty_optionals_are_omitted() {
        let v = serde_json::to_value(not_found("USERS_NOT_FOUND", "gone").0).unwrap();
        assert!(v.get("instance").is_none());
        assert!(v.get("requestId").is_none());
        assert!(v.get("errors").is_none());
        assert_eq!(internal_error("boom").0.status, 500);
        assert_eq!(conflict("X", "y").0.title, "Conflict");
    }
}
