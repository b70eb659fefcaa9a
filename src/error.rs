//! Domain error taxonomy shared by every data-access module.
//!
//! Validation variants abort an operation before anything is written.
//! `Store` wraps backend failures; callers that perform bulk work count these
//! per item instead of aborting the batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key name cannot be empty")]
    EmptyKeyName,

    #[error("base language text cannot be empty")]
    EmptyBaseText,

    #[error("invalid language code: '{0}'")]
    InvalidLanguageCode(String),

    #[error("language '{0}' already exists in this project")]
    DuplicateCode(String),

    #[error("key '{0}' already exists in this namespace")]
    DuplicateKey(String),

    #[error("the base language cannot be removed")]
    BaseLanguageProtected,

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no machine-translation credential configured for this project")]
    MissingCredential,

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyKeyName => "empty_key_name",
            Error::EmptyBaseText => "empty_base_text",
            Error::InvalidLanguageCode(_) => "invalid_language_code",
            Error::DuplicateCode(_) => "duplicate_code",
            Error::DuplicateKey(_) => "duplicate_key",
            Error::BaseLanguageProtected => "base_language_protected",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Malformed(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::MissingCredential => "missing_credential",
            Error::Network(_) => "network_error",
            Error::Store(_) => "internal",
        }
    }

    /// True for errors caused by caller input rather than the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyKeyName
                | Error::EmptyBaseText
                | Error::InvalidLanguageCode(_)
                | Error::DuplicateCode(_)
                | Error::DuplicateKey(_)
                | Error::BaseLanguageProtected
                | Error::UnsupportedFormat(_)
                | Error::Malformed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
