//! Error types for the correspondence library
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a frontend as plain messages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store refused a write. The previous value under `key` is intact.
    #[error("Storage capacity exceeded writing {key}: {required} bytes required, {available} available")]
    CapacityExceeded {
        key: String,
        required: usize,
        available: usize,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Carries no detail about which credential was wrong.
    #[error("Invalid username or password")]
    AuthenticationFailure,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Letter {id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
