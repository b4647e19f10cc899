use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use modkit::api::problem::{Problem, ProblemResponse};
use modkit::XRequestId;

use crate::domain::error::DomainError;

/// Where a problem happened: request path plus the `x-request-id`, if any.
#[derive(Debug, Clone, Default)]
pub struct ProblemCtx {
    pub instance: String,
    pub request_id: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ProblemCtx {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            instance: parts.uri.path().to_owned(),
            request_id: parts.extensions.get::<XRequestId>().map(|r| r.0.clone()),
        })
    }
}

impl ProblemCtx {
    pub fn domain(&self, e: &DomainError) -> ProblemResponse {
        map_domain_error(e, self)
    }

    /// Body that could not be parsed as JSON of the expected shape.
    pub fn bad_body(&self, rejection: &JsonRejection) -> ProblemResponse {
        from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_VALIDATION",
            "Validation error",
            rejection.body_text(),
            self,
        )
    }

    /// Query string that does not deserialize, e.g. a repeated key.
    pub fn bad_query(&self, rejection: &QueryRejection) -> ProblemResponse {
        from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_VALIDATION",
            "Validation error",
            rejection.body_text(),
            self,
        )
    }
}

/// Helper to create a ProblemResponse with less boilerplate
pub fn from_parts(
    status: StatusCode,
    code: &str,
    title: &str,
    detail: impl Into<String>,
    ctx: &ProblemCtx,
) -> ProblemResponse {
    let mut problem = Problem::new(status, title, detail)
        .with_type(format!("https://errors.users.local/{}", code.to_ascii_lowercase()))
        .with_code(code)
        .with_instance(ctx.instance.as_str());
    if let Some(id) = &ctx.request_id {
        problem = problem.with_request_id(id.as_str());
    }
    ProblemResponse(problem)
}

/// Map domain error to RFC9457 ProblemResponse
pub fn map_domain_error(e: &DomainError, ctx: &ProblemCtx) -> ProblemResponse {
    match e {
        DomainError::UserNotFound { id } => from_parts(
            StatusCode::NOT_FOUND,
            "USERS_NOT_FOUND",
            "User not found",
            format!("User with id {id} was not found"),
            ctx,
        ),
        DomainError::EmailAlreadyExists { email } => from_parts(
            StatusCode::CONFLICT,
            "USERS_EMAIL_CONFLICT",
            "Email already exists",
            format!("Email '{email}' is already in use"),
            ctx,
        ),
        DomainError::AlreadyDeleted { .. } => from_parts(
            StatusCode::CONFLICT,
            "USERS_ALREADY_DELETED",
            "User already deleted",
            e.to_string(),
            ctx,
        ),
        DomainError::NotDeleted { .. } => from_parts(
            StatusCode::CONFLICT,
            "USERS_NOT_DELETED",
            "User is not deleted",
            e.to_string(),
            ctx,
        ),
        DomainError::InvalidEmail { .. }
        | DomainError::EmptyName
        | DomainError::NameTooLong { .. }
        | DomainError::Validation { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_VALIDATION",
            "Validation error",
            e.to_string(),
            ctx,
        ),
        DomainError::InvalidFields { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_INVALID_FIELDS",
            "Invalid fields",
            e.to_string(),
            ctx,
        ),
        DomainError::InvalidPattern { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_INVALID_PATTERN",
            "Invalid name pattern",
            e.to_string(),
            ctx,
        ),
        DomainError::InvalidCursor { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_INVALID_CURSOR",
            "Invalid cursor",
            e.to_string(),
            ctx,
        ),
        DomainError::EmptySearchQuery => from_parts(
            StatusCode::BAD_REQUEST,
            "USERS_SEARCH_QUERY_REQUIRED",
            "Search query required",
            "Query parameter 'q' must not be empty",
            ctx,
        ),
        DomainError::TextIndexMissing => {
            tracing::warn!("Search rejected: text index not provisioned");
            from_parts(
                StatusCode::BAD_REQUEST,
                "USERS_TEXT_INDEX_MISSING",
                "Text index missing",
                e.to_string(),
                ctx,
            )
        }
        DomainError::Database { .. } => {
            // Log the internal error details but don't expose them to the client
            tracing::error!(error = ?e, "Database error occurred");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_DB",
                "Internal error",
                "An internal database error occurred",
                ctx,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx() -> ProblemCtx {
        ProblemCtx {
            instance: "/users/x".into(),
            request_id: Some("req-7".into()),
        }
    }

    #[test]
    fn conflicts_and_not_found() {
        let id = Uuid::nil();
        assert_eq!(ctx().domain(&DomainError::user_not_found(id)).0.status, 404);
        let p = ctx().domain(&DomainError::already_deleted(id)).0;
        assert_eq!((p.status, p.code.as_str()), (409, "USERS_ALREADY_DELETED"));
        let p = ctx().domain(&DomainError::not_deleted(id)).0;
        assert_eq!(p.code, "USERS_NOT_DELETED");
        let p = ctx().domain(&DomainError::email_already_exists("a@b.io")).0;
        assert_eq!((p.status, p.code.as_str()), (409, "USERS_EMAIL_CONFLICT"));
    }

    #[test]
    fn carries_instance_and_request_id() {
        let p = ctx().domain(&DomainError::EmptySearchQuery).0;
        assert_eq!(p.status, 400);
        assert_eq!(p.code, "USERS_SEARCH_QUERY_REQUIRED");
        assert_eq!(p.instance, "/users/x");
        assert_eq!(p.request_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn database_details_stay_private() {
        let p = ctx()
            .domain(&DomainError::database("disk I/O error at /var/db"))
            .0;
        assert_eq!(p.status, 500);
        assert_eq!(p.code, "INTERNAL_DB");
        assert!(!p.detail.contains("/var/db"));
    }

    #[test]
    fn misconfiguration_is_a_client_error_code() {
        let p = ctx().domain(&DomainError::TextIndexMissing).0;
        assert_eq!((p.status, p.code.as_str()), (400, "USERS_TEXT_INDEX_MISSING"));
        let p = ctx().domain(&DomainError::invalid_cursor("zzz")).0;
        assert_eq!(p.code, "USERS_INVALID_CURSOR");
    }
}
