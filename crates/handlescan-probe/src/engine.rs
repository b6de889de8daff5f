//! Top-level probing entry point.

use crate::aggregator::SessionReport;
use crate::dispatcher::{ProbeDispatcher, ProbeRun};
use crate::error::Result;
use crate::notify::{NotificationSink, SinkSet};
use crate::session::ProbeSession;
use crate::transport::{HttpTransport, ReqwestTransport};
use handlescan_core::{expand_username_variants, ProbingConfig};
use handlescan_sites::{LoadPolicy, SiteRegistry};
use std::sync::Arc;
use tracing::info;

/// Owns a site registry, a transport and the subscribed sinks, and runs
/// probe sessions against them.
///
/// # Example
///
/// ```rust,no_run
/// use handlescan_probe::{ProbeEngine, ProbeSession, TracingSink};
/// use handlescan_sites::{LoadPolicy, SiteRegistry};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = SiteRegistry::load("resources/sites.json", LoadPolicy::Lenient).await?;
/// let mut engine = ProbeEngine::with_config(Arc::new(registry), &Default::default())?;
/// engine.subscribe(Arc::new(TracingSink::new()));
///
/// let session = ProbeSession::builder("octocat").concurrency_limit(10).build()?;
/// let report = engine.run_probe_session(session).await?;
/// for hit in report.claimed() {
///     println!("{}: {}", hit.site_name(), hit.target_url());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ProbeEngine {
    registry: Arc<SiteRegistry>,
    dispatcher: ProbeDispatcher,
    sinks: SinkSet,
}

impl ProbeEngine {
    /// Create an engine over an injected transport.
    #[must_use]
    pub fn new(registry: Arc<SiteRegistry>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            registry,
            dispatcher: ProbeDispatcher::new(transport),
            sinks: SinkSet::new(),
        }
    }

    /// Create an engine with a `reqwest` transport built from config.
    pub fn with_config(registry: Arc<SiteRegistry>, config: &ProbingConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::new(registry, Arc::new(transport)))
    }

    /// Load the catalog at `source` and build a config-driven engine over it.
    ///
    /// # Errors
    /// Returns [`crate::ProbeError::Registry`] if the catalog cannot be
    /// loaded, or a transport error if the HTTP client cannot be built.
    pub async fn from_catalog(
        source: &str,
        policy: LoadPolicy,
        config: &ProbingConfig,
    ) -> Result<Self> {
        let registry = SiteRegistry::load(source, policy).await?;
        Self::with_config(Arc::new(registry), config)
    }

    /// Receive progress for every session started after this call.
    pub fn subscribe(&mut self, sink: Arc<dyn NotificationSink>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    /// The registry sessions run against.
    #[must_use]
    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Start a session and return a streaming handle.
    #[must_use]
    pub fn start(&self, session: ProbeSession) -> ProbeRun {
        self.dispatcher.start(
            session,
            Arc::clone(&self.registry),
            Arc::new(self.sinks.clone()),
        )
    }

    /// Run one session to completion.
    pub async fn run_probe_session(&self, session: ProbeSession) -> Result<SessionReport> {
        self.start(session).finish().await
    }

    /// Run the session once per `{?}` variant of its username, in order.
    ///
    /// A username without the placeholder runs once.
    pub async fn run_variants(&self, session: ProbeSession) -> Result<Vec<SessionReport>> {
        let variants = expand_username_variants(session.username());
        if variants.len() > 1 {
            info!(
                template = %session.username(),
                variants = variants.len(),
                "expanding username variants"
            );
        }

        let mut reports = Vec::with_capacity(variants.len());
        for variant in variants {
            let session = session.for_username(variant);
            if session.cancellation_token().is_cancelled() {
                break;
            }
            reports.push(self.run_probe_session(session).await?);
        }
        Ok(reports)
    }
}
