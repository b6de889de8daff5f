//! Concurrent probe dispatch.
//!
//! The dispatcher fans a session out over its sites with at most
//! `concurrency_limit` probes in flight, forwarding each result to the
//! notification sink, the aggregator and the result stream as it completes.

use crate::aggregator::{ResultAggregator, SessionReport, SessionSummary};
use crate::error::{ProbeError, Result};
use crate::executor::ProbeExecutor;
use crate::notify::NotificationSink;
use crate::result::ProbeResult;
use crate::session::ProbeSession;
use crate::transport::HttpTransport;
use futures::channel::mpsc;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use handlescan_sites::SiteRegistry;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Context recorded for sites never dispatched because the session was cancelled.
pub const CANCELLED_CONTEXT: &str = "cancelled before dispatch";

/// Context recorded for sites never dispatched because the session deadline passed.
pub const DEADLINE_CONTEXT: &str = "session deadline reached before dispatch";

/// Why dispatch stopped before the queue was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    Deadline,
}

impl StopReason {
    fn context(self) -> &'static str {
        match self {
            Self::Cancelled => CANCELLED_CONTEXT,
            Self::Deadline => DEADLINE_CONTEXT,
        }
    }
}

/// Runs probe sessions.
#[derive(Clone)]
pub struct ProbeDispatcher {
    executor: Arc<ProbeExecutor>,
}

impl ProbeDispatcher {
    /// Create a dispatcher over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            executor: Arc::new(ProbeExecutor::new(transport)),
        }
    }

    /// Start a session in the background and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        &self,
        session: ProbeSession,
        registry: Arc<SiteRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> ProbeRun {
        let aggregator = Arc::new(ResultAggregator::new(
            session.id().clone(),
            session.username().as_str(),
        ));
        let (tx, rx) = mpsc::unbounded();
        let cancel = session.cancellation_token();

        let driver = SessionDriver {
            executor: Arc::clone(&self.executor),
            session,
            registry,
            sink,
            aggregator: Arc::clone(&aggregator),
            results: tx,
        };

        ProbeRun {
            results: rx,
            aggregator,
            cancel,
            driver: tokio::spawn(driver.run()),
        }
    }

    /// Run a session to completion.
    pub async fn run(
        &self,
        session: ProbeSession,
        registry: Arc<SiteRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<SessionReport> {
        self.start(session, registry, sink).finish().await
    }
}

/// Handle to a running session.
///
/// Yields each [`ProbeResult`] as it completes, in completion order. The
/// stream ends once every site has a result.
pub struct ProbeRun {
    results: mpsc::UnboundedReceiver<ProbeResult>,
    aggregator: Arc<ResultAggregator>,
    cancel: CancellationToken,
    driver: JoinHandle<SessionSummary>,
}

impl ProbeRun {
    /// Stop dispatching new probes. In-flight probes still finish, and every
    /// site not yet dispatched is reported `Unknown`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Results recorded so far, in site-name order.
    #[must_use]
    pub fn partial(&self) -> Vec<ProbeResult> {
        self.aggregator.partial()
    }

    /// Wait for the session to end and collect the report.
    ///
    /// # Errors
    /// Returns [`ProbeError::Internal`] if the session driver panicked.
    pub async fn finish(self) -> Result<SessionReport> {
        drop(self.results);
        let summary = self
            .driver
            .await
            .map_err(|e| ProbeError::Internal(e.to_string()))?;
        Ok(self.aggregator.report(summary))
    }
}

impl Stream for ProbeRun {
    type Item = ProbeResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().results.poll_next_unpin(cx)
    }
}

struct SessionDriver {
    executor: Arc<ProbeExecutor>,
    session: ProbeSession,
    registry: Arc<SiteRegistry>,
    sink: Arc<dyn NotificationSink>,
    aggregator: Arc<ResultAggregator>,
    results: mpsc::UnboundedSender<ProbeResult>,
}

impl SessionDriver {
    async fn run(self) -> SessionSummary {
        let plan = self.session.plan(&self.registry);
        let username = self.session.username().as_str().to_string();
        let limit = self.session.concurrency_limit();
        let cancel = self.session.cancellation_token();
        let deadline = self.session.session_deadline().map(|d| Instant::now() + d);

        for name in &plan.unmatched {
            warn!(site = %name, "requested site not found in registry");
        }

        self.sink.start(&username);
        info!(
            session_id = %self.session.id(),
            username = %username,
            sites = plan.sites.len(),
            concurrency_limit = limit,
            "probe session started"
        );

        let mut queue: VecDeque<String> = plan.sites.into();
        let mut in_flight = FuturesUnordered::new();
        let mut stopped = None;

        while let Some(name) = queue.pop_front() {
            if let Some(reason) = Self::stop_reason(&cancel, deadline) {
                queue.push_front(name);
                stopped = Some(reason);
                break;
            }

            let handle = self.spawn_probe(&name, &username);
            in_flight.push(async move { (name, handle.await) });

            // Respect concurrency limit
            while in_flight.len() >= limit {
                if let Some((name, joined)) = in_flight.next().await {
                    self.settle_joined(&name, &username, joined);
                }
            }
        }

        if let Some(reason) = stopped {
            warn!(
                session_id = %self.session.id(),
                undispatched = queue.len(),
                reason = reason.context(),
                "probe session stopped early"
            );
            for name in queue {
                let url = self.target_url(&name, &username);
                self.settle(ProbeResult::unknown(
                    &username,
                    name,
                    url,
                    None,
                    reason.context(),
                ));
            }
        }

        // Collect remaining results
        while let Some((name, joined)) = in_flight.next().await {
            self.settle_joined(&name, &username, joined);
        }

        let summary = self
            .aggregator
            .summary(plan.unmatched, stopped.is_some());
        self.sink.finish(&summary);

        info!(
            session_id = %summary.session_id,
            total = summary.total,
            cancelled = summary.cancelled,
            "probe session finished"
        );

        summary
    }

    fn stop_reason(cancel: &CancellationToken, deadline: Option<Instant>) -> Option<StopReason> {
        if cancel.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StopReason::Deadline)
        } else {
            None
        }
    }

    fn spawn_probe(&self, name: &str, username: &str) -> JoinHandle<ProbeResult> {
        let executor = Arc::clone(&self.executor);
        let registry = Arc::clone(&self.registry);
        let name = name.to_string();
        let username = username.to_string();
        let timeout = self.session.per_probe_timeout();
        let retry = self.session.retry_policy().clone();

        debug!(site = %name, "dispatching probe");

        tokio::spawn(async move {
            match registry.get(&name) {
                Some(site) => executor.probe(&username, site, timeout, &retry).await,
                None => ProbeResult::unknown(
                    username,
                    name,
                    String::new(),
                    None,
                    "site not in registry",
                ),
            }
        })
    }

    fn target_url(&self, name: &str, username: &str) -> String {
        self.registry
            .get(name)
            .map(|site| site.profile_url(username))
            .unwrap_or_default()
    }

    fn settle_joined(
        &self,
        name: &str,
        username: &str,
        joined: std::result::Result<ProbeResult, tokio::task::JoinError>,
    ) {
        let result = joined.unwrap_or_else(|e| {
            error!(site = %name, error = %e, "probe task failed");
            ProbeResult::unknown(
                username,
                name,
                self.target_url(name, username),
                None,
                format!("probe task failed: {e}"),
            )
        });
        self.settle(result);
    }

    fn settle(&self, result: ProbeResult) {
        self.sink.update(&result);

        if let Err(e) = self.aggregator.record(result.clone()) {
            error!(error = %e, "dropping result");
            return;
        }

        // Receiver may already be gone; the aggregator still has the result.
        let _ = self.results.unbounded_send(result);
    }
}
