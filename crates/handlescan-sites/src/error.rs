//! Error types for the site catalog subsystem.

use thiserror::Error;

/// Errors that stop a catalog from loading at all.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Catalog source does not carry a recognized structured-data extension
    #[error("catalog source {location} must end in .json")]
    WrongExtension {
        /// Path or URL of the catalog
        location: String,
    },

    /// Local catalog file does not exist
    #[error("catalog file not found at {location}")]
    NotFound {
        /// Path of the catalog
        location: String,
    },

    /// Remote catalog could not be reached
    #[error("catalog at {location} is unreachable: {reason}")]
    Unreachable {
        /// URL of the catalog
        location: String,
        /// Transport failure description
        reason: String,
    },

    /// Remote catalog answered with something other than 200
    #[error("catalog at {location} returned HTTP {status}")]
    BadStatus {
        /// URL of the catalog
        location: String,
        /// HTTP status code received
        status: u16,
    },

    /// Catalog contents are not a JSON object of site entries
    #[error("catalog at {location} is malformed: {reason}")]
    Malformed {
        /// Path or URL of the catalog
        location: String,
        /// Parser or structure error
        reason: String,
    },

    /// Strict loading rejected an entry
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// I/O error while reading a local catalog
    #[error("failed to read catalog at {location}: {source}")]
    Io {
        /// Path of the catalog
        location: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// A single site entry that failed validation.
///
/// In lenient mode these are recorded on the registry and the entry is
/// dropped; in strict mode the first one aborts the load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid site definition for {site}: {field} {reason}")]
pub struct ValidationError {
    /// Name of the offending site
    pub site: String,
    /// Catalog field that is missing or invalid
    pub field: String,
    /// What is wrong with it
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(
        site: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            site: site.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(site: &str, field: &str) -> Self {
        Self::new(site, field, "is required")
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
