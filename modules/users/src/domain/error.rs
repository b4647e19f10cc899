use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {id}")]
    UserNotFound { id: Uuid },

    #[error("User with email '{email}' already exists")]
    EmailAlreadyExists { email: String },

    #[error("User {id} is already deleted")]
    AlreadyDeleted { id: Uuid },

    #[error("User {id} is not deleted")]
    NotDeleted { id: Uuid },

    #[error("Invalid email format: '{email}'")]
    InvalidEmail { email: String },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Name too long: {len} characters (max: {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Invalid fields: {}", fields.join(", "))]
    InvalidFields { fields: Vec<String> },

    #[error("Invalid pattern: {message}")]
    InvalidPattern { message: String },

    #[error("Invalid cursor: '{cursor}'")]
    InvalidCursor { cursor: String },

    #[error("Search query is required")]
    EmptySearchQuery,

    #[error("Text index is missing; run `users-server provision-indexes`")]
    TextIndexMissing,

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }

    pub fn email_already_exists(email: impl Into<String>) -> Self {
        Self::EmailAlreadyExists {
            email: email.into(),
        }
    }

    pub fn already_deleted(id: Uuid) -> Self {
        Self::AlreadyDeleted { id }
    }

    pub fn not_deleted(id: Uuid) -> Self {
        Self::NotDeleted { id }
    }

    pub fn invalid_email(email: impl Into<String>) -> Self {
        Self::InvalidEmail {
            email: email.into(),
        }
    }

    pub fn name_too_long(len: usize, max: usize) -> Self {
        Self::NameTooLong { len, max }
    }

    pub fn invalid_fields(fields: Vec<String>) -> Self {
        Self::InvalidFields { fields }
    }

    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    pub fn invalid_cursor(cursor: impl Into<String>) -> Self {
        Self::InvalidCursor {
            cursor: cursor.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Caller-side (4xx) errors, as opposed to store failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database { .. })
    }
}
