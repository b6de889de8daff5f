//! Per-session result collection.

use crate::error::{ProbeError, Result};
use crate::result::{ProbeResult, ProbeStatus};
use chrono::{DateTime, Utc};
use handlescan_core::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Totals for a finished (or cancelled) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session this summary belongs to
    pub session_id: SessionId,
    /// Username probed
    pub username: String,
    /// When dispatch began
    pub started_at: DateTime<Utc>,
    /// When the last result was recorded
    pub finished_at: DateTime<Utc>,
    /// Number of results recorded
    pub total: usize,
    /// Results per status; every status is present, possibly zero
    pub counts: BTreeMap<ProbeStatus, usize>,
    /// Requested site names that were not in the registry
    pub unmatched_sites: Vec<String>,
    /// Whether dispatch stopped early because of cancellation or the deadline
    pub cancelled: bool,
}

impl SessionSummary {
    /// Count for one status.
    #[must_use]
    pub fn count(&self, status: ProbeStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// Summary plus every result, keyed by site name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session totals
    pub summary: SessionSummary,
    /// One result per probed site
    pub results: BTreeMap<String, ProbeResult>,
}

impl SessionReport {
    /// Result for a site, by exact name.
    #[must_use]
    pub fn get(&self, site: &str) -> Option<&ProbeResult> {
        self.results.get(site)
    }

    /// Results with status `Claimed`, in site-name order.
    pub fn claimed(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.values().filter(|r| r.is_claimed())
    }

    /// Results with the given status, in site-name order.
    pub fn with_status(&self, status: ProbeStatus) -> impl Iterator<Item = &ProbeResult> {
        self.results.values().filter(move |r| r.status() == status)
    }
}

/// Collects results for one username.
///
/// Shared between the dispatcher and readers of partial results; all access
/// goes through an internal lock.
pub struct ResultAggregator {
    session_id: SessionId,
    username: String,
    started_at: DateTime<Utc>,
    results: Mutex<BTreeMap<String, ProbeResult>>,
}

impl ResultAggregator {
    /// Create an empty aggregator for `username`.
    #[must_use]
    pub fn new(session_id: SessionId, username: impl Into<String>) -> Self {
        Self {
            session_id,
            username: username.into(),
            started_at: Utc::now(),
            results: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a result.
    ///
    /// # Errors
    /// Returns [`ProbeError::DuplicateResult`] if the site already has a
    /// result, or [`ProbeError::ForeignResult`] if the result is for another
    /// username.
    pub fn record(&self, result: ProbeResult) -> Result<()> {
        if result.username() != self.username {
            return Err(ProbeError::ForeignResult {
                site: result.site_name().to_string(),
                username: result.username().to_string(),
            });
        }

        let mut results = self.results.lock().expect("acquire results lock");
        if results.contains_key(result.site_name()) {
            return Err(ProbeError::DuplicateResult {
                site: result.site_name().to_string(),
            });
        }

        results.insert(result.site_name().to_string(), result);
        Ok(())
    }

    /// Number of results recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().expect("acquire results lock").len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of results recorded so far, in site-name order.
    #[must_use]
    pub fn partial(&self) -> Vec<ProbeResult> {
        self.results
            .lock()
            .expect("acquire results lock")
            .values()
            .cloned()
            .collect()
    }

    /// Totals over what has been recorded.
    #[must_use]
    pub fn summary(&self, unmatched_sites: Vec<String>, cancelled: bool) -> SessionSummary {
        let results = self.results.lock().expect("acquire results lock");

        let mut counts: BTreeMap<ProbeStatus, usize> =
            ProbeStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for result in results.values() {
            *counts.entry(result.status()).or_default() += 1;
        }

        SessionSummary {
            session_id: self.session_id.clone(),
            username: self.username.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            total: results.len(),
            counts,
            unmatched_sites,
            cancelled,
        }
    }

    /// Pair a summary with a copy of every recorded result.
    #[must_use]
    pub fn report(&self, summary: SessionSummary) -> SessionReport {
        SessionReport {
            summary,
            results: self.results.lock().expect("acquire results lock").clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn claimed(site: &str) -> ProbeResult {
        ProbeResult::resolved("alice", site, format!("https://{site}/alice"), true, Duration::ZERO)
    }

    #[test]
    fn test_record_and_summary() {
        let aggregator = ResultAggregator::new(SessionId::generate(), "alice");
        aggregator.record(claimed("a")).expect("record a");
        aggregator
            .record(ProbeResult::illegal("alice", "b", "https://b/alice"))
            .expect("record b");

        let summary = aggregator.summary(vec!["missing".to_string()], false);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.count(ProbeStatus::Claimed), 1);
        assert_eq!(summary.count(ProbeStatus::Illegal), 1);
        assert_eq!(summary.count(ProbeStatus::Unknown), 0);
        assert_eq!(summary.unmatched_sites, vec!["missing"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let aggregator = ResultAggregator::new(SessionId::generate(), "alice");
        aggregator.record(claimed("a")).expect("first record");

        let err = aggregator.record(claimed("a")).expect_err("duplicate");
        assert!(matches!(err, ProbeError::DuplicateResult { ref site } if site == "a"));
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_foreign_username_rejected() {
        let aggregator = ResultAggregator::new(SessionId::generate(), "alice");
        let other = ProbeResult::illegal("bob", "a", "https://a/bob");

        assert!(matches!(
            aggregator.record(other),
            Err(ProbeError::ForeignResult { .. })
        ));
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_report_claimed_and_serialize() {
        let aggregator = ResultAggregator::new(SessionId::generate(), "alice");
        aggregator.record(claimed("a")).expect("record a");
        aggregator
            .record(ProbeResult::resolved("alice", "b", "u", false, Duration::ZERO))
            .expect("record b");

        let report = aggregator.report(aggregator.summary(Vec::new(), false));
        let names: Vec<&str> = report.claimed().map(ProbeResult::site_name).collect();
        assert_eq!(names, vec!["a"]);

        let json = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(json["summary"]["counts"]["Claimed"], 1);
        assert_eq!(json["results"]["b"]["status"], "Available");
    }
}
