//! Probe session parameters.
//!
//! A [`ProbeSession`] fixes everything about one run before it starts: the
//! username, which sites, how many probes may be in flight, how long each
//! probe may take and how it retries. Invalid parameters are rejected at
//! [`ProbeSessionBuilder::build`], never mid-run.

use crate::error::{ProbeError, Result};
use chrono::{DateTime, Utc};
use handlescan_core::{ProbingConfig, SessionId, Username};
use handlescan_sites::SiteRegistry;
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry behavior for transient failures within one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Random spread applied to each delay, as a fraction (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy described by the `[probing]` config section.
    #[must_use]
    pub fn from_config(config: &ProbingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
            ..Self::default()
        }
    }

    /// Set the attempt count.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first retry delay.
    #[must_use]
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set the jitter fraction; `0.0` makes delays deterministic.
    #[must_use]
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Check the policy can be executed.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ProbeError::config("max_attempts", "must be at least 1"));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ProbeError::config(
                "backoff_multiplier",
                format!("must be >= 1.0, got {}", self.backoff_multiplier),
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ProbeError::config(
                "jitter_factor",
                format!("must be within 0.0..=1.0, got {}", self.jitter_factor),
            ));
        }

        Ok(())
    }

    /// Delay before retry number `retry` (1 = the first retry), without jitter.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Delay before retry number `retry`, with jitter applied.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let base_delay = self.base_backoff(retry);
        let base = base_delay.as_secs_f64();
        let spread = base * self.jitter_factor;
        if spread <= 0.0 {
            return base_delay;
        }

        let jitter = rand::thread_rng().gen_range(-spread..spread);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// Immutable parameters of one probe session.
#[derive(Debug, Clone)]
pub struct ProbeSession {
    id: SessionId,
    username: Username,
    sites: Option<Vec<String>>,
    concurrency_limit: usize,
    per_probe_timeout: Duration,
    retry_policy: RetryPolicy,
    exclude_nsfw: bool,
    session_deadline: Option<Duration>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
}

/// Sites a session will probe, resolved against a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPlan {
    /// Registry names to probe, sorted case-insensitively
    pub sites: Vec<String>,
    /// Requested names that are not in the registry
    pub unmatched: Vec<String>,
}

impl ProbeSession {
    /// Start building a session for `username`.
    pub fn builder(username: impl Into<String>) -> ProbeSessionBuilder {
        ProbeSessionBuilder::new(username)
    }

    /// Unique id of this session.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Username being probed.
    #[must_use]
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Requested subset of site names, or `None` for the whole registry.
    #[must_use]
    pub fn sites(&self) -> Option<&[String]> {
        self.sites.as_deref()
    }

    /// Maximum probes in flight.
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Budget for one probe across all attempts.
    #[must_use]
    pub fn per_probe_timeout(&self) -> Duration {
        self.per_probe_timeout
    }

    /// Retry behavior for transient failures.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Whether NSFW sites are skipped when no subset is named.
    #[must_use]
    pub fn exclude_nsfw(&self) -> bool {
        self.exclude_nsfw
    }

    /// Time after which no new probes are dispatched.
    #[must_use]
    pub fn session_deadline(&self) -> Option<Duration> {
        self.session_deadline
    }

    /// When the session parameters were built.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Token that stops dispatch of further probes when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop dispatching further probes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Same parameters for another username, under a fresh session id.
    ///
    /// The cancellation token is shared, so cancelling one cancels all.
    #[must_use]
    pub fn for_username(&self, username: Username) -> Self {
        Self {
            id: SessionId::generate(),
            username,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Resolve the sites to probe.
    ///
    /// Without a subset, every registry site is probed, minus NSFW sites if
    /// excluded. Sites named explicitly are probed even when flagged NSFW.
    #[must_use]
    pub fn plan(&self, registry: &SiteRegistry) -> SessionPlan {
        match &self.sites {
            Some(requested) => {
                let selection = registry.select(requested);
                SessionPlan {
                    sites: selection.matched,
                    unmatched: selection.unmatched,
                }
            }
            None => {
                let sites = registry
                    .site_name_list()
                    .into_iter()
                    .filter(|name| {
                        !self.exclude_nsfw || registry.get(name).is_some_and(|s| !s.is_nsfw)
                    })
                    .collect();
                SessionPlan {
                    sites,
                    unmatched: Vec::new(),
                }
            }
        }
    }
}

/// Builder for [`ProbeSession`].
#[derive(Debug, Clone)]
pub struct ProbeSessionBuilder {
    username: String,
    sites: Option<Vec<String>>,
    concurrency_limit: usize,
    per_probe_timeout: Duration,
    retry_policy: RetryPolicy,
    exclude_nsfw: bool,
    session_deadline: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ProbeSessionBuilder {
    fn new(username: impl Into<String>) -> Self {
        let defaults = ProbingConfig::default();
        Self {
            username: username.into(),
            sites: None,
            concurrency_limit: defaults.concurrency_limit,
            per_probe_timeout: defaults.timeout(),
            retry_policy: RetryPolicy::from_config(&defaults),
            exclude_nsfw: defaults.exclude_nsfw,
            session_deadline: defaults.session_deadline(),
            cancel: None,
        }
    }

    /// Take limits, timeouts, retries and the NSFW flag from config.
    #[must_use]
    pub fn config(mut self, config: &ProbingConfig) -> Self {
        self.concurrency_limit = config.concurrency_limit;
        self.per_probe_timeout = config.timeout();
        self.retry_policy = RetryPolicy::from_config(config);
        self.exclude_nsfw = config.exclude_nsfw;
        self.session_deadline = config.session_deadline();
        self
    }

    /// Restrict the session to these site names (matched case-insensitively).
    #[must_use]
    pub fn sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    /// Maximum probes in flight at once.
    #[must_use]
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Budget for one probe, covering all its attempts.
    #[must_use]
    pub fn per_probe_timeout(mut self, timeout: Duration) -> Self {
        self.per_probe_timeout = timeout;
        self
    }

    /// Retry behavior for transient failures.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Skip NSFW sites unless named explicitly.
    #[must_use]
    pub fn exclude_nsfw(mut self, exclude: bool) -> Self {
        self.exclude_nsfw = exclude;
        self
    }

    /// Stop dispatching new probes after this long.
    #[must_use]
    pub fn session_deadline(mut self, deadline: Duration) -> Self {
        self.session_deadline = Some(deadline);
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate and build the session.
    ///
    /// # Errors
    /// Returns [`ProbeError::Configuration`] for a blank username, a zero
    /// limit or timeout, an empty site subset, or an invalid retry policy.
    pub fn build(self) -> Result<ProbeSession> {
        let username = Username::new(self.username)
            .map_err(|e| ProbeError::config("username", e.to_string()))?;

        if self.concurrency_limit == 0 {
            return Err(ProbeError::config("concurrency_limit", "must be at least 1"));
        }

        if self.per_probe_timeout.is_zero() {
            return Err(ProbeError::config("per_probe_timeout", "must be non-zero"));
        }

        if self.session_deadline.is_some_and(|d| d.is_zero()) {
            return Err(ProbeError::config("session_deadline", "must be non-zero"));
        }

        let sites = match self.sites {
            Some(sites) => {
                let unique: BTreeSet<&str> = sites.iter().map(|s| s.trim()).collect();
                if unique.is_empty() || unique.contains("") {
                    return Err(ProbeError::config(
                        "sites",
                        "subset must name at least one non-empty site",
                    ));
                }
                Some(sites)
            }
            None => None,
        };

        self.retry_policy.validate()?;

        Ok(ProbeSession {
            id: SessionId::generate(),
            username,
            sites,
            concurrency_limit: self.concurrency_limit,
            per_probe_timeout: self.per_probe_timeout,
            retry_policy: self.retry_policy,
            exclude_nsfw: self.exclude_nsfw,
            session_deadline: self.session_deadline,
            cancel: self.cancel.unwrap_or_default(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlescan_sites::{DetectionRule, SiteDefinition};

    fn create_site(name: &str, nsfw: bool) -> SiteDefinition {
        SiteDefinition::new(
            name,
            format!("https://{name}.test"),
            format!("https://{name}.test/{{}}"),
            DetectionRule::StatusCode {
                error_codes: vec![],
            },
            "alice",
        )
        .expect("valid definition")
        .with_nsfw(nsfw)
    }

    fn registry() -> SiteRegistry {
        SiteRegistry::from_definitions([
            create_site("alpha", false),
            create_site("Beta", true),
            create_site("gamma", false),
        ])
        .expect("valid registry")
    }

    #[test]
    fn test_builder_defaults() {
        let session = ProbeSession::builder("octocat").build().expect("valid session");
        assert_eq!(session.concurrency_limit(), 20);
        assert_eq!(session.per_probe_timeout(), Duration::from_secs(60));
        assert_eq!(session.retry_policy().max_attempts, 3);
        assert!(session.sites().is_none());
        assert!(session.session_deadline().is_none());
    }

    #[test]
    fn test_builder_rejects_bad_parameters() {
        let cases = [
            (ProbeSession::builder("  "), "username"),
            (ProbeSession::builder("a").concurrency_limit(0), "concurrency_limit"),
            (ProbeSession::builder("a").per_probe_timeout(Duration::ZERO), "per_probe_timeout"),
            (
                ProbeSession::builder("a").retry_policy(RetryPolicy::default().with_max_attempts(0)),
                "max_attempts",
            ),
            (ProbeSession::builder("a").sites(Vec::<String>::new()), "sites"),
        ];

        for (builder, expected_field) in cases {
            match builder.build() {
                Err(ProbeError::Configuration { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected configuration error for {expected_field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
        assert_eq!(policy.backoff(4), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let policy = RetryPolicy::default().with_jitter(0.5);
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(250));
            assert!(delay <= Duration::from_millis(750));
        }
    }

    #[test]
    fn test_plan_whole_registry_excluding_nsfw() {
        let session = ProbeSession::builder("a")
            .exclude_nsfw(true)
            .build()
            .expect("valid session");
        let plan = session.plan(&registry());

        assert_eq!(plan.sites, vec!["alpha", "gamma"]);
        assert!(plan.unmatched.is_empty());
    }

    #[test]
    fn test_plan_subset_keeps_named_nsfw() {
        let session = ProbeSession::builder("a")
            .sites(["BETA", "nowhere"])
            .exclude_nsfw(true)
            .build()
            .expect("valid session");
        let plan = session.plan(&registry());

        assert_eq!(plan.sites, vec!["Beta"]);
        assert_eq!(plan.unmatched, vec!["nowhere"]);
    }

    #[test]
    fn test_for_username_shares_cancellation() {
        let session = ProbeSession::builder("a").build().expect("valid session");
        let other = session.for_username(Username::new("b").expect("valid username"));

        assert_ne!(session.id(), other.id());
        session.cancel();
        assert!(other.cancellation_token().is_cancelled());
    }
}
