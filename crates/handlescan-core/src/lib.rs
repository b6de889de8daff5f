//! Handlescan Core - Foundation crate for the handlescan username prober.
//!
//! This crate provides shared types, error handling and configuration
//! management that the site registry, the probing engine and the CLI
//! shell depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes (`Username`, `SessionId`) and username variant expansion
//!
//! # Example
//!
//! ```rust
//! use handlescan_core::{AppConfig, Username};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let username = Username::new("octocat")?;
//! assert_eq!(username.as_str(), "octocat");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, CatalogConfig, ProbingConfig, DEFAULT_CATALOG_URL};
pub use error::{ConfigError, ConfigResult, HandleScanError, Result};
pub use types::{expand_username_variants, SessionId, Username, VARIANT_PLACEHOLDER};
