//! Handlescan Probe - Concurrent username presence probing.
//!
//! This crate checks one username against many sites at once. It sends a
//! request per site, classifies the response with the site's detection rule
//! and reports each outcome as soon as it is known.
//!
//! # Features
//!
//! - Bounded concurrency with a configurable in-flight limit
//! - Per-probe timeout covering every retry attempt
//! - Exponential backoff with jitter for transient failures
//! - Cancellation and session deadlines without losing results
//! - Results streamed in completion order, plus a final report
//! - Pluggable HTTP transport and notification sinks
//!
//! # Example
//!
//! ```rust,ignore
//! use handlescan_probe::{ProbeDispatcher, ProbeSession, TracingSink};
//!
//! let dispatcher = ProbeDispatcher::new(transport);
//! let session = ProbeSession::builder("octocat").build()?;
//! let report = dispatcher
//!     .run(session, registry, Arc::new(TracingSink::new()))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod classify;
pub mod dispatcher;
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod executor;
pub mod notify;
pub mod result;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use aggregator::{ResultAggregator, SessionReport, SessionSummary};
pub use classify::{classify, RuleError, Verdict};
pub use dispatcher::{ProbeDispatcher, ProbeRun, CANCELLED_CONTEXT, DEADLINE_CONTEXT};
pub use engine::ProbeEngine;
pub use error::{ProbeError, Result};
pub use executor::ProbeExecutor;
pub use notify::{NoopSink, NotificationSink, RecordingSink, SinkEvent, SinkSet, TracingSink};
pub use result::{ProbeResult, ProbeStatus};
pub use session::{ProbeSession, ProbeSessionBuilder, RetryPolicy, SessionPlan};
pub use transport::{CapturedResponse, HttpTransport, ProbeRequest, ReqwestTransport, TransportError};
