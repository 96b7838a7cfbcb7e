use quad_types::api::PostAction;
use quad_types::models::PostStatus;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// Also returned for content the caller may not see.
    #[error("Not found")]
    NotFound,

    #[error("Cannot {action} a {from} post")]
    InvalidTransition { from: PostStatus, action: PostAction },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Post changed since it was read; reload and retry")]
    EditConflict,

    #[error("Event is full ({max_slots} slots)")]
    CapacityExceeded { max_slots: u32 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_error",
            Self::EditConflict => "edit_conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Storage(_) => "internal",
        }
    }
}
