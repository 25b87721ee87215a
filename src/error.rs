use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A non-null value did not name any member of the target enum.
    #[error("`{value}` is not a member of enum `{ty}`")]
    UnknownEnumMember { ty: String, value: String },

    #[error("a decoder is already registered for `{ty}`")]
    DuplicateRegistration { ty: String },

    /// Raised while deriving, never while decoding.
    #[error("cannot derive a decoder for `{ty}`: {reason}")]
    Unsupported { ty: String, reason: String },

    #[error("deferred decoder for `{ty}` was used before it was filled")]
    Unresolved { ty: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("schema error at {path}: {message}")]
    Schema { path: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Schema { path: path.into(), message: message.into() }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: &crate::native::Native) -> Self {
        Error::TypeMismatch { expected: expected.into(), found: found.kind_name().to_string() }
    }
}
