use thiserror::Error;

/// Errors raised by the presence/contact-list core.
///
/// Domain kinds are surfaced to wire-protocol adapters for translation into
/// protocol-specific replies; `Storage` wraps opaque failures that propagate
/// from the persistence layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("user does not exist")]
    UserDoesNotExist,

    #[error("contact does not exist")]
    ContactDoesNotExist,

    #[error("contact already on list")]
    ContactAlreadyOnList,

    #[error("contact not on list")]
    ContactNotOnList,

    #[error("contact not online")]
    ContactNotOnline,

    #[error("group does not exist")]
    GroupDoesNotExist,

    #[error("group name too long (max {max} chars)")]
    GroupNameTooLong { max: usize },

    #[error("group already exists")]
    GroupAlreadyExists,

    #[error("cannot remove the special ungrouped group")]
    CannotRemoveSpecialGroup,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("internal invariant violation: {0}")]
    ServerError(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Infrastructure-level failures from the persistence layer.
///
/// Kept distinct from `CoreError::ServerError` so call sites that care about
/// cause (database vs. filesystem vs. serialization) can match on it, while
/// adapters still only ever see one opaque `CoreError::Storage` variant.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
