//! Site definition types and structures.
//!
//! A [`SiteDefinition`] is the static description of one service: where to
//! send the probe, how to tell a claimed username from an available one,
//! and which usernames the service accepts at all.

use crate::error::ValidationError;
use fancy_regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Substitution token for the username inside URL templates.
pub const USERNAME_TOKEN: &str = "{}";

/// Complete definition of one probeable site.
#[derive(Debug, Clone)]
pub struct SiteDefinition {
    /// Unique, case-sensitive site name
    pub name: String,

    /// Home page of the service
    pub home_url: String,

    /// Profile URL template containing [`USERNAME_TOKEN`] exactly once
    pub username_url_template: String,

    /// Alternate URL actually requested, if the public profile URL is not probeable
    pub probe_url_template: Option<String>,

    /// How a response is classified as claimed or available
    pub detection_rule: DetectionRule,

    /// A username known to exist on the service
    pub username_claimed: String,

    /// A username known not to exist on the service
    pub username_unclaimed: Option<String>,

    /// Adult-content flag, used by the NSFW filter
    pub is_nsfw: bool,

    /// Usernames not matching this pattern are rejected without a request
    pub username_pattern: Option<UsernamePattern>,

    /// HTTP method override
    pub request_method: Option<RequestMethod>,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl SiteDefinition {
    /// Create a definition with the required fields.
    ///
    /// # Errors
    /// Returns error if a required field is empty or the template does not
    /// contain the username token exactly once.
    pub fn new(
        name: impl Into<String>,
        home_url: impl Into<String>,
        username_url_template: impl Into<String>,
        detection_rule: DetectionRule,
        username_claimed: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let definition = Self {
            name: name.into(),
            home_url: home_url.into(),
            username_url_template: username_url_template.into(),
            probe_url_template: None,
            detection_rule,
            username_claimed: username_claimed.into(),
            username_unclaimed: None,
            is_nsfw: false,
            username_pattern: None,
            request_method: None,
            headers: BTreeMap::new(),
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Set the known-unclaimed example username.
    #[must_use]
    pub fn with_unclaimed(mut self, username: impl Into<String>) -> Self {
        self.username_unclaimed = Some(username.into());
        self
    }

    /// Mark the site as adult content.
    #[must_use]
    pub fn with_nsfw(mut self, is_nsfw: bool) -> Self {
        self.is_nsfw = is_nsfw;
        self
    }

    /// Restrict accepted usernames to a pattern.
    #[must_use]
    pub fn with_username_pattern(mut self, pattern: UsernamePattern) -> Self {
        self.username_pattern = Some(pattern);
        self
    }

    /// Probe a different URL than the reported profile URL.
    ///
    /// # Errors
    /// Returns error if the template does not contain the token exactly once.
    pub fn with_probe_url(mut self, template: impl Into<String>) -> Result<Self, ValidationError> {
        let template = template.into();
        check_template(&self.name, "urlProbe", &template)?;
        self.probe_url_template = Some(template);
        Ok(self)
    }

    /// Override the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.request_method = Some(method);
        self
    }

    /// Add an extra request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::new("<unnamed>", "name", "cannot be empty"));
        }

        if self.home_url.is_empty() {
            return Err(ValidationError::missing(&self.name, "urlMain"));
        }

        if self.username_claimed.is_empty() {
            return Err(ValidationError::missing(&self.name, "username_claimed"));
        }

        check_template(&self.name, "url", &self.username_url_template)?;

        if let Some(probe) = &self.probe_url_template {
            check_template(&self.name, "urlProbe", probe)?;
        }

        Ok(())
    }

    /// Whether `username` is structurally acceptable to this site.
    #[must_use]
    pub fn accepts_username(&self, username: &str) -> bool {
        self.username_pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(username))
    }

    /// Profile URL with the username substituted.
    #[must_use]
    pub fn profile_url(&self, username: &str) -> String {
        self.username_url_template.replace(USERNAME_TOKEN, username)
    }

    /// URL the probe request goes to.
    #[must_use]
    pub fn probe_url(&self, username: &str) -> String {
        self.probe_url_template
            .as_deref()
            .unwrap_or(&self.username_url_template)
            .replace(USERNAME_TOKEN, username)
    }

    /// HTTP method for the probe.
    ///
    /// Status-code-only rules never read the body, so they default to `HEAD`.
    #[must_use]
    pub fn effective_method(&self) -> RequestMethod {
        self.request_method.unwrap_or(if self.detection_rule.is_status_only() {
            RequestMethod::Head
        } else {
            RequestMethod::Get
        })
    }
}

fn check_template(site: &str, field: &str, template: &str) -> Result<(), ValidationError> {
    if template.is_empty() {
        return Err(ValidationError::missing(site, field));
    }

    match template.matches(USERNAME_TOKEN).count() {
        1 => Ok(()),
        0 => Err(ValidationError::new(
            site,
            field,
            format!("must contain the {USERNAME_TOKEN} username token"),
        )),
        n => Err(ValidationError::new(
            site,
            field,
            format!("must contain the {USERNAME_TOKEN} username token once, found {n}"),
        )),
    }
}

/// Per-site rule deciding whether a captured response means the username exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionRule {
    /// Listed status codes, or any non-2xx code, mean the username is available
    StatusCode {
        /// Status codes the site answers with for unknown users
        error_codes: Vec<u16>,
    },

    /// Any of these substrings in the body means the username is available
    Message {
        /// Body fragments shown for unknown users
        error_messages: Vec<String>,
    },

    /// The response location decides
    ResponseUrl {
        /// Redirect target for unknown users; when absent, redirects are not
        /// followed and only a 2xx means claimed
        error_url: Option<String>,
    },

    /// Every member rule must report claimed
    All(Vec<DetectionRule>),
}

impl DetectionRule {
    /// Catalog name of the rule kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusCode { .. } => "status_code",
            Self::Message { .. } => "message",
            Self::ResponseUrl { .. } => "response_url",
            Self::All(_) => "combination",
        }
    }

    /// True when only status codes are inspected.
    #[must_use]
    pub fn is_status_only(&self) -> bool {
        match self {
            Self::StatusCode { .. } => true,
            Self::All(rules) => !rules.is_empty() && rules.iter().all(Self::is_status_only),
            _ => false,
        }
    }

    /// Whether the probe should follow redirects.
    #[must_use]
    pub fn follows_redirects(&self) -> bool {
        match self {
            Self::ResponseUrl { error_url: None } => false,
            Self::All(rules) => rules.iter().all(Self::follows_redirects),
            _ => true,
        }
    }

    /// True when a status-code rule names `status` as its not-found answer.
    #[must_use]
    pub fn lists_error_code(&self, status: u16) -> bool {
        match self {
            Self::StatusCode { error_codes } => error_codes.contains(&status),
            Self::All(rules) => rules.iter().any(|rule| rule.lists_error_code(status)),
            _ => false,
        }
    }
}

/// Compiled username legality pattern.
#[derive(Debug, Clone)]
pub struct UsernamePattern {
    source: String,
    regex: Regex,
}

impl UsernamePattern {
    /// Compile a pattern.
    ///
    /// # Errors
    /// Returns the regex error if the pattern does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self, fancy_regex::Error> {
        let source = source.into();
        let regex = Regex::new(&source)?;
        Ok(Self { source, regex })
    }

    /// Original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the username matches the pattern anywhere.
    ///
    /// A match that aborts on the backtracking limit counts as a match, so
    /// the site is still probed.
    #[must_use]
    pub fn is_match(&self, username: &str) -> bool {
        self.regex.is_match(username).unwrap_or(true)
    }
}

impl PartialEq for UsernamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// HTTP methods a probe may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
}

impl RequestMethod {
    /// Parse a catalog method name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Upper-case method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
