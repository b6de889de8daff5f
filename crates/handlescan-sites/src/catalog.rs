//! JSON catalog schema and per-entry conversion.
//!
//! The catalog is one JSON object keyed by site name. Each entry is parsed on
//! its own so that one broken entry can be reported without losing the rest.

use crate::definition::{DetectionRule, RequestMethod, SiteDefinition, UsernamePattern};
use crate::error::{RegistryError, Result, ValidationError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key carrying the schema tag; never a site.
pub const SCHEMA_KEY: &str = "$schema";

/// A catalog split into entries, before any policy is applied.
#[derive(Debug)]
pub struct ParsedCatalog {
    /// Value of the `$schema` key, if the catalog declares one
    pub schema: Option<String>,
    /// One conversion result per site entry, in key order
    pub entries: Vec<std::result::Result<SiteDefinition, ValidationError>>,
}

/// Parse catalog text.
///
/// # Errors
/// Returns [`RegistryError::Malformed`] if the text is not JSON or the top
/// level is not an object. Problems inside individual entries are returned
/// per entry, not as an error.
pub fn parse_catalog(contents: &str, location: &str) -> Result<ParsedCatalog> {
    let value: Value = serde_json::from_str(contents).map_err(|e| RegistryError::Malformed {
        location: location.to_string(),
        reason: format!("invalid JSON: {e}"),
    })?;

    let Value::Object(mut object) = value else {
        return Err(RegistryError::Malformed {
            location: location.to_string(),
            reason: "top level must be an object keyed by site name".to_string(),
        });
    };

    let schema = object
        .remove(SCHEMA_KEY)
        .and_then(|v| v.as_str().map(str::to_string));

    let entries = object
        .into_iter()
        .map(|(name, entry)| convert_entry(&name, entry))
        .collect();

    Ok(ParsedCatalog { schema, entries })
}

/// Either a single value or a list, as the catalog allows both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Site entry exactly as it appears in the catalog.
#[derive(Debug, Deserialize)]
struct RawSiteEntry {
    #[serde(rename = "urlMain")]
    url_main: Option<String>,
    url: Option<String>,
    #[serde(rename = "urlProbe")]
    url_probe: Option<String>,
    username_claimed: Option<String>,
    username_unclaimed: Option<String>,
    #[serde(rename = "errorType")]
    error_type: Option<OneOrMany<String>>,
    #[serde(rename = "errorCode")]
    error_code: Option<OneOrMany<u16>>,
    #[serde(rename = "errorMsg")]
    error_msg: Option<OneOrMany<String>>,
    #[serde(rename = "errorUrl")]
    error_url: Option<String>,
    #[serde(rename = "regexCheck")]
    regex_check: Option<String>,
    request_method: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(rename = "isNSFW", default)]
    is_nsfw: bool,
}

fn convert_entry(name: &str, entry: Value) -> std::result::Result<SiteDefinition, ValidationError> {
    if !entry.is_object() {
        return Err(ValidationError::new(name, "entry", "must be an object"));
    }

    let raw: RawSiteEntry = serde_json::from_value(entry)
        .map_err(|e| ValidationError::new(name, "entry", format!("has a bad field: {e}")))?;

    let home_url = required(name, "urlMain", raw.url_main)?;
    let template = required(name, "url", raw.url)?;
    let claimed = required(name, "username_claimed", raw.username_claimed)?;

    let rule = build_rule(
        name,
        raw.error_type,
        raw.error_code,
        raw.error_msg,
        raw.error_url,
    )?;

    let mut definition = SiteDefinition::new(name, home_url, template, rule, claimed)?
        .with_nsfw(raw.is_nsfw);

    definition.username_unclaimed = raw.username_unclaimed.filter(|u| !u.is_empty());
    definition.headers = raw.headers;

    if let Some(probe) = raw.url_probe {
        definition = definition.with_probe_url(probe)?;
    }

    if let Some(pattern) = raw.regex_check {
        let pattern = UsernamePattern::new(pattern)
            .map_err(|e| ValidationError::new(name, "regexCheck", format!("does not compile: {e}")))?;
        definition = definition.with_username_pattern(pattern);
    }

    if let Some(method) = raw.request_method {
        let method = RequestMethod::parse(&method).ok_or_else(|| {
            ValidationError::new(name, "request_method", format!("unsupported method {method}"))
        })?;
        definition = definition.with_method(method);
    }

    Ok(definition)
}

fn required(
    site: &str,
    field: &str,
    value: Option<String>,
) -> std::result::Result<String, ValidationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::missing(site, field))
}

fn build_rule(
    site: &str,
    error_type: Option<OneOrMany<String>>,
    error_code: Option<OneOrMany<u16>>,
    error_msg: Option<OneOrMany<String>>,
    error_url: Option<String>,
) -> std::result::Result<DetectionRule, ValidationError> {
    let kinds = error_type
        .map(OneOrMany::into_vec)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ValidationError::missing(site, "errorType"))?;

    let error_codes = error_code.map(OneOrMany::into_vec).unwrap_or_default();
    let error_messages = error_msg.map(OneOrMany::into_vec);

    let mut rules = Vec::with_capacity(kinds.len());
    for kind in &kinds {
        let rule = match kind.as_str() {
            "status_code" => DetectionRule::StatusCode {
                error_codes: error_codes.clone(),
            },
            "message" => DetectionRule::Message {
                error_messages: error_messages
                    .clone()
                    .ok_or_else(|| ValidationError::missing(site, "errorMsg"))?,
            },
            "response_url" => DetectionRule::ResponseUrl {
                error_url: error_url.clone().filter(|u| !u.is_empty()),
            },
            other => {
                return Err(ValidationError::new(
                    site,
                    "errorType",
                    format!("has unknown kind {other}"),
                ))
            }
        };
        rules.push(rule);
    }

    if rules.len() == 1 {
        Ok(rules.remove(0))
    } else {
        Ok(DetectionRule::All(rules))
    }
}
