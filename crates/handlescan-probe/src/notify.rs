//! Progress notification sinks.
//!
//! The dispatcher calls [`NotificationSink::start`] once, then
//! [`NotificationSink::update`] once per site as results arrive, then
//! [`NotificationSink::finish`] once. Methods default to no-ops so a sink
//! only implements what it cares about.

use crate::aggregator::SessionSummary;
use crate::result::{ProbeResult, ProbeStatus};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Receives session progress.
pub trait NotificationSink: Send + Sync {
    /// Called before any probe is dispatched.
    fn start(&self, _username: &str) {}

    /// Called once per site as its result is ready.
    fn update(&self, _result: &ProbeResult) {}

    /// Called once after the last result.
    fn finish(&self, _summary: &SessionSummary) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {}

/// Emits progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    claimed_only: bool,
}

impl TracingSink {
    /// Log every result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log only claimed results at info level; the rest go to debug.
    #[must_use]
    pub fn claimed_only() -> Self {
        Self { claimed_only: true }
    }
}

impl NotificationSink for TracingSink {
    fn start(&self, username: &str) {
        info!(username, "checking username");
    }

    fn update(&self, result: &ProbeResult) {
        if self.claimed_only && result.status() != ProbeStatus::Claimed {
            debug!(
                site = result.site_name(),
                status = %result.status(),
                context = result.context().unwrap_or_default(),
                "probe result"
            );
            return;
        }

        info!(
            site = result.site_name(),
            status = %result.status(),
            url = result.target_url(),
            context = result.context().unwrap_or_default(),
            "probe result"
        );
    }

    fn finish(&self, summary: &SessionSummary) {
        info!(
            username = %summary.username,
            total = summary.total,
            claimed = summary.count(ProbeStatus::Claimed),
            cancelled = summary.cancelled,
            "search completed"
        );
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// `start` with the username
    Start(String),
    /// `update` with a result
    Update(ProbeResult),
    /// `finish` with the summary
    Finish(SessionSummary),
}

/// Records every call, in order. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().expect("acquire events lock").clone()
    }

    /// Results passed to `update`, in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<ProbeResult> {
        self.events
            .lock()
            .expect("acquire events lock")
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Update(result) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().expect("acquire events lock").push(event);
    }
}

impl NotificationSink for RecordingSink {
    fn start(&self, username: &str) {
        self.push(SinkEvent::Start(username.to_string()));
    }

    fn update(&self, result: &ProbeResult) {
        self.push(SinkEvent::Update(result.clone()));
    }

    fn finish(&self, summary: &SessionSummary) {
        self.push(SinkEvent::Finish(summary.clone()));
    }
}

/// Forwards every call to each member sink in order.
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl SinkSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn push(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Number of member sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether the set has no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for SinkSet {
    fn start(&self, username: &str) {
        for sink in &self.sinks {
            sink.start(username);
        }
    }

    fn update(&self, result: &ProbeResult) {
        for sink in &self.sinks {
            sink.update(result);
        }
    }

    fn finish(&self, summary: &SessionSummary) {
        for sink in &self.sinks {
            sink.finish(summary);
        }
    }
}
