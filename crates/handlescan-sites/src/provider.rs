//! Catalog providers.
//!
//! A provider only fetches catalog text; parsing and validation happen in
//! [`crate::catalog`] and [`crate::registry`]. Callers inject whichever
//! provider fits (local file, pinned remote URL, in-memory fixture).

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Extension every catalog source must carry.
pub const CATALOG_EXTENSION: &str = "json";

/// Raw catalog text plus where it came from.
#[derive(Debug, Clone)]
pub struct RawCatalog {
    /// Path or URL the text was read from
    pub location: String,
    /// Catalog text
    pub contents: String,
}

/// Source of catalog text.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch the catalog text.
    ///
    /// # Errors
    /// Returns error if the source cannot be read.
    async fn fetch(&self) -> Result<RawCatalog>;

    /// Human-readable location, used in logs and errors.
    fn location(&self) -> &str;
}

/// A catalog location given as a string, resolved to local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// Local file path
    Local(PathBuf),
    /// `http(s)` URL
    Remote(String),
}

impl CatalogSource {
    /// Classify and validate a source string.
    ///
    /// # Errors
    /// Returns [`RegistryError::WrongExtension`] if the source does not end in `.json`.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();

        if source.starts_with("http://") || source.starts_with("https://") {
            check_url_extension(source)?;
            Ok(Self::Remote(source.to_string()))
        } else {
            let path = PathBuf::from(source);
            check_path_extension(&path)?;
            Ok(Self::Local(path))
        }
    }

    /// Build the matching provider.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn into_provider(self) -> Result<Box<dyn CatalogProvider>> {
        match self {
            Self::Local(path) => Ok(Box::new(FileCatalog::new(path)?)),
            Self::Remote(url) => Ok(Box::new(HttpCatalog::new(url)?)),
        }
    }
}

fn check_path_extension(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(CATALOG_EXTENSION));

    if ok {
        Ok(())
    } else {
        Err(RegistryError::WrongExtension {
            location: path.display().to_string(),
        })
    }
}

fn check_url_extension(url: &str) -> Result<()> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ok = path
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(CATALOG_EXTENSION));

    if ok {
        Ok(())
    } else {
        Err(RegistryError::WrongExtension {
            location: url.to_string(),
        })
    }
}

/// Catalog read from a local file.
pub struct FileCatalog {
    path: PathBuf,
    location: String,
}

impl FileCatalog {
    /// Create a provider for a `.json` file.
    ///
    /// # Errors
    /// Returns error if the path has the wrong extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        check_path_extension(&path)?;
        let location = path.display().to_string();
        Ok(Self { path, location })
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    async fn fetch(&self) -> Result<RawCatalog> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RegistryError::NotFound {
                    location: self.location.clone(),
                },
                _ => RegistryError::Io {
                    location: self.location.clone(),
                    source: e,
                },
            })?;

        debug!(path = %self.location, bytes = contents.len(), "read catalog file");

        Ok(RawCatalog {
            location: self.location.clone(),
            contents,
        })
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Catalog fetched from a remote URL.
pub struct HttpCatalog {
    url: String,
    client: Client,
}

impl HttpCatalog {
    /// Create a provider for a `.json` URL with a default client.
    ///
    /// # Errors
    /// Returns error if the URL has the wrong extension or the HTTP client
    /// cannot be created.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RegistryError::Unreachable {
                location: url.clone(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Self::with_client(url, client)
    }

    /// Create a provider sharing an existing client.
    ///
    /// # Errors
    /// Returns error if the URL has the wrong extension.
    pub fn with_client(url: impl Into<String>, client: Client) -> Result<Self> {
        let url = url.into();
        check_url_extension(&url)?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalog {
    async fn fetch(&self) -> Result<RawCatalog> {
        let response =
            self.client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| RegistryError::Unreachable {
                    location: self.url.clone(),
                    reason: e.to_string(),
                })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RegistryError::BadStatus {
                location: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let contents = response
            .text()
            .await
            .map_err(|e| RegistryError::Unreachable {
                location: self.url.clone(),
                reason: format!("failed to read body: {e}"),
            })?;

        debug!(url = %self.url, bytes = contents.len(), "fetched remote catalog");

        Ok(RawCatalog {
            location: self.url.clone(),
            contents,
        })
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// Catalog held in memory, for embedding a pinned catalog or for tests.
pub struct StaticCatalog {
    location: String,
    contents: String,
}

impl StaticCatalog {
    /// Wrap catalog text under a descriptive location.
    #[must_use]
    pub fn new(location: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            contents: contents.into(),
        }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn fetch(&self) -> Result<RawCatalog> {
        Ok(RawCatalog {
            location: self.location.clone(),
            contents: self.contents.clone(),
        })
    }

    fn location(&self) -> &str {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_parse_local() {
        let source = CatalogSource::parse("/etc/handlescan/sites.json").expect("json path");
        assert_eq!(
            source,
            CatalogSource::Local(PathBuf::from("/etc/handlescan/sites.json"))
        );
    }

    #[test]
    fn test_source_parse_remote_with_query() {
        let source =
            CatalogSource::parse("https://example.com/data.json?ref=v1").expect("json url");
        assert!(matches!(source, CatalogSource::Remote(_)));
    }

    #[test]
    fn test_source_wrong_extension() {
        for bad in ["sites.yaml", "sites", "https://example.com/data", "https://x.test/a.txt"] {
            let err = CatalogSource::parse(bad).expect_err("wrong extension");
            assert!(matches!(err, RegistryError::WrongExtension { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_file_catalog_reads() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("sites.json");
        std::fs::write(&path, "{}").expect("write catalog");

        let provider = FileCatalog::new(&path).expect("create provider");
        let raw = provider.fetch().await.expect("fetch catalog");
        assert_eq!(raw.contents, "{}");
        assert_eq!(raw.location, path.display().to_string());
    }

    #[tokio::test]
    async fn test_file_catalog_missing() {
        let dir = TempDir::new().expect("create temp dir");
        let provider = FileCatalog::new(dir.path().join("absent.json")).expect("create provider");

        let err = provider.fetch().await.expect_err("missing file");
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let provider = StaticCatalog::new("pinned", "{\"a\": 1}");
        assert_eq!(provider.location(), "pinned");
        assert_eq!(provider.fetch().await.expect("fetch").contents, "{\"a\": 1}");
    }
}
