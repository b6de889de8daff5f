//! Handlescan Sites - Site catalog system for username probing.
//!
//! This crate provides the core types and functionality for managing site
//! definitions. It handles fetching a JSON catalog from a local file or a
//! remote URL, validating each entry, and providing query capabilities.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed site metadata and detection rules
//! - **Catalog** ([`catalog`]): JSON schema and per-entry conversion
//! - **Providers** ([`provider`]): File, remote and in-memory catalog sources
//! - **Registry** ([`registry`]): In-memory map with NSFW filtering and name selection
//! - **Errors** ([`error`]): Load and validation error types
//!
//! # Example
//!
//! ```rust,no_run
//! use handlescan_sites::{LoadPolicy, SiteRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = SiteRegistry::load("resources/sites.json", LoadPolicy::Lenient).await?;
//! registry.remove_nsfw_sites();
//!
//! for name in registry.site_name_list() {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod catalog;
pub mod definition;
pub mod error;
pub mod provider;
pub mod registry;

// Re-export commonly used types
pub use catalog::{parse_catalog, ParsedCatalog};
pub use definition::{DetectionRule, RequestMethod, SiteDefinition, UsernamePattern, USERNAME_TOKEN};
pub use error::{RegistryError, Result, ValidationError};
pub use provider::{CatalogProvider, CatalogSource, FileCatalog, HttpCatalog, RawCatalog, StaticCatalog};
pub use registry::{LoadPolicy, SiteRegistry, SiteSelection};
