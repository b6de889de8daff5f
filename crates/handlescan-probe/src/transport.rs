//! HTTP transport abstraction.
//!
//! The executor talks to the network only through [`HttpTransport`], so
//! tests can swap in a scripted transport and production uses
//! [`ReqwestTransport`].

use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use handlescan_core::ProbingConfig;
use handlescan_sites::RequestMethod;
use reqwest::{redirect, Client, Method, Proxy};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Maximum redirects followed when a rule asks for them.
const MAX_REDIRECTS: usize = 10;

/// One outgoing probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// HTTP method
    pub method: RequestMethod,
    /// Fully substituted URL
    pub url: String,
    /// Extra headers; these override transport defaults
    pub headers: BTreeMap<String, String>,
    /// Whether redirects are followed
    pub follow_redirects: bool,
    /// Time left for this attempt
    pub timeout: Duration,
}

/// What the classifier gets to see of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    /// Final HTTP status code
    pub status: u16,
    /// URL after any redirects that were followed
    pub final_url: String,
    /// Body text; `None` for `HEAD` requests
    pub body: Option<String>,
}

impl CapturedResponse {
    /// Response with a body.
    #[must_use]
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            body: Some(body.into()),
        }
    }

    /// Response to a `HEAD` request.
    #[must_use]
    pub fn headers_only(status: u16, final_url: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            body: None,
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Failure to obtain a response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("redirect not followed: {0}")]
    Redirect(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout | Self::Proxy(_))
    }

    /// Short failure class used in result context.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connection failed",
            Self::Timeout => "timed out",
            Self::Proxy(_) => "proxy failed",
            Self::InvalidRequest(_) => "invalid request",
            Self::Body(_) => "unreadable response",
            Self::Redirect(_) => "too many redirects",
        }
    }
}

/// Executes probe requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request and capture status, final URL and body.
    ///
    /// Any HTTP status is a successful response here; only failures to get
    /// one are errors.
    async fn execute(&self, request: &ProbeRequest)
        -> std::result::Result<CapturedResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
///
/// Keeps two clients because the redirect policy is fixed per client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    following: Client,
    direct: Client,
}

impl ReqwestTransport {
    /// Build clients with the given user agent and optional proxy.
    ///
    /// # Errors
    /// Returns [`ProbeError::Transport`] if the proxy URL is invalid or a
    /// client cannot be created.
    pub fn new(user_agent: &str, proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            following: Self::build_client(
                user_agent,
                proxy,
                redirect::Policy::limited(MAX_REDIRECTS),
            )?,
            direct: Self::build_client(user_agent, proxy, redirect::Policy::none())?,
        })
    }

    /// Build from the `[probing]` config section.
    pub fn from_config(config: &ProbingConfig) -> Result<Self> {
        Self::new(&config.user_agent, config.proxy.as_deref())
    }

    fn build_client(
        user_agent: &str,
        proxy: Option<&str>,
        policy: redirect::Policy,
    ) -> Result<Client> {
        let mut builder = Client::builder().user_agent(user_agent).redirect(policy);

        if let Some(url) = proxy {
            let proxy = Proxy::all(url)
                .map_err(|e| ProbeError::Transport(format!("invalid proxy {url}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))
    }

    fn map_error(err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if err.is_redirect() {
            TransportError::Redirect(err.to_string())
        } else {
            TransportError::Connect(err.to_string())
        }
    }
}

fn to_method(method: RequestMethod) -> Method {
    match method {
        RequestMethod::Get => Method::GET,
        RequestMethod::Head => Method::HEAD,
        RequestMethod::Post => Method::POST,
        RequestMethod::Put => Method::PUT,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: &ProbeRequest,
    ) -> std::result::Result<CapturedResponse, TransportError> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let mut builder = client
            .request(to_method(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        trace!(url = %request.url, status, final_url = %final_url, "probe response");

        if request.method == RequestMethod::Head {
            return Ok(CapturedResponse::headers_only(status, final_url));
        }

        let body = response.text().await.map_err(|e| Self::map_error(&e))?;
        Ok(CapturedResponse::new(status, final_url, body))
    }
}
