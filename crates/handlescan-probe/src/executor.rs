//! Single-site probe execution.

use crate::classify::{classify, Verdict};
use crate::result::ProbeResult;
use crate::session::RetryPolicy;
use crate::transport::{CapturedResponse, HttpTransport, ProbeRequest, TransportError};
use handlescan_sites::SiteDefinition;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Why one attempt produced no usable response.
#[derive(Debug)]
enum AttemptFailure {
    Transport(TransportError),
    ServerError(u16),
}

impl AttemptFailure {
    fn class(&self) -> String {
        match self {
            Self::Transport(e) => e.class().to_string(),
            Self::ServerError(status) => format!("server error (HTTP {status})"),
        }
    }
}

/// Probes one site for one username.
///
/// Never fails: every outcome, including network trouble and broken rules,
/// comes back as a [`ProbeResult`].
pub struct ProbeExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl ProbeExecutor {
    /// Create an executor over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Probe `site` for `username`.
    ///
    /// `timeout` bounds the whole probe including retries. Each attempt gets
    /// an even share of the budget still left, so an attempt that hangs
    /// leaves room for the ones after it.
    pub async fn probe(
        &self,
        username: &str,
        site: &SiteDefinition,
        timeout: Duration,
        retry: &RetryPolicy,
    ) -> ProbeResult {
        let target_url = site.profile_url(username);

        if !site.accepts_username(username) {
            debug!(site = %site.name, username, "username rejected by site pattern");
            return ProbeResult::illegal(username, &site.name, target_url);
        }

        let mut request = ProbeRequest {
            method: site.effective_method(),
            url: site.probe_url(username),
            headers: site.headers.clone(),
            follow_redirects: site.detection_rule.follows_redirects(),
            timeout,
        };

        let started = Instant::now();
        let deadline = started + timeout;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_failure = AttemptFailure::Transport(TransportError::Timeout);

        while attempts < max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let slice = remaining / (max_attempts - attempts);
            attempts += 1;
            request.timeout = slice;

            let failure = match tokio::time::timeout(slice, self.transport.execute(&request)).await
            {
                Err(_) => AttemptFailure::Transport(TransportError::Timeout),
                Ok(Err(e)) if e.is_transient() => AttemptFailure::Transport(e),
                Ok(Err(e)) => {
                    debug!(site = %site.name, error = %e, "probe failed permanently");
                    return ProbeResult::unknown(
                        username,
                        &site.name,
                        target_url,
                        Some(started.elapsed()),
                        format!("{}: {e}", e.class()),
                    );
                }
                Ok(Ok(response))
                    if response.is_server_error()
                        && !site.detection_rule.lists_error_code(response.status) =>
                {
                    AttemptFailure::ServerError(response.status)
                }
                Ok(Ok(response)) => {
                    return Self::evaluate(username, site, target_url, &response, started);
                }
            };

            if attempts < max_attempts {
                let delay = retry.backoff(attempts);
                let remaining = deadline.saturating_duration_since(Instant::now());
                if delay >= remaining {
                    debug!(site = %site.name, "probe budget exhausted before next retry");
                    last_failure = failure;
                    break;
                }

                warn!(
                    site = %site.name,
                    attempt = attempts,
                    max_attempts,
                    failure = %failure.class(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "probe attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            last_failure = failure;
        }

        let plural = if attempts == 1 { "attempt" } else { "attempts" };
        ProbeResult::unknown(
            username,
            &site.name,
            target_url,
            Some(started.elapsed()),
            format!("{} after {attempts} {plural}", last_failure.class()),
        )
    }

    fn evaluate(
        username: &str,
        site: &SiteDefinition,
        target_url: String,
        response: &CapturedResponse,
        started: Instant,
    ) -> ProbeResult {
        match classify(&site.detection_rule, response, username) {
            Ok(verdict) => {
                debug!(site = %site.name, status = response.status, ?verdict, "probe classified");
                ProbeResult::resolved(
                    username,
                    &site.name,
                    target_url,
                    verdict == Verdict::Claimed,
                    started.elapsed(),
                )
            }
            Err(e) => {
                warn!(site = %site.name, error = %e, "detection rule could not be evaluated");
                ProbeResult::unknown(
                    username,
                    &site.name,
                    target_url,
                    Some(started.elapsed()),
                    format!("detection rule could not be evaluated: {e}"),
                )
            }
        }
    }
}
