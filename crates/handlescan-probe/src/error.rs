//! Error types for the probing engine.
//!
//! Per-site failures never show up here: they become `Unknown` or `Illegal`
//! results. These errors stop a session before it starts or report a broken
//! engine invariant.

use handlescan_sites::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid session parameter {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("site registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to build HTTP transport: {0}")]
    Transport(String),

    #[error("duplicate result for site {site} in one session")]
    DuplicateResult { site: String },

    #[error("result for {site} belongs to username {username}, not this session")]
    ForeignResult { site: String, username: String },

    #[error("probe session driver failed: {0}")]
    Internal(String),
}

impl ProbeError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<handlescan_core::ConfigError> for ProbeError {
    fn from(err: handlescan_core::ConfigError) -> Self {
        match err {
            handlescan_core::ConfigError::InvalidValue { field, reason } => {
                Self::Configuration { field, reason }
            }
            other => Self::config("config", other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
