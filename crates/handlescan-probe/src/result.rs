//! Probe outcome types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Final status of probing one site for one username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// The username exists on the site
    Claimed,
    /// The username does not exist on the site
    Available,
    /// The probe could not reach a verdict
    Unknown,
    /// The username is structurally invalid for the site; no request was sent
    Illegal,
}

impl ProbeStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 4] = [Self::Claimed, Self::Available, Self::Unknown, Self::Illegal];

    /// Status name as shown to users.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claimed => "Claimed",
            Self::Available => "Available",
            Self::Unknown => "Unknown",
            Self::Illegal => "Illegal",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one (username, site) probe.
///
/// Built only through the constructors below, so an `Illegal` result never
/// carries a timing and an `Unknown` result always explains itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    username: String,
    site_name: String,
    target_url: String,
    status: ProbeStatus,
    elapsed: Option<Duration>,
    context: Option<String>,
}

impl ProbeResult {
    /// A response was classified as claimed or available.
    #[must_use]
    pub fn resolved(
        username: impl Into<String>,
        site_name: impl Into<String>,
        target_url: impl Into<String>,
        claimed: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            site_name: site_name.into(),
            target_url: target_url.into(),
            status: if claimed {
                ProbeStatus::Claimed
            } else {
                ProbeStatus::Available
            },
            elapsed: Some(elapsed),
            context: None,
        }
    }

    /// The site rejects the username before any request.
    #[must_use]
    pub fn illegal(
        username: impl Into<String>,
        site_name: impl Into<String>,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            site_name: site_name.into(),
            target_url: target_url.into(),
            status: ProbeStatus::Illegal,
            elapsed: None,
            context: None,
        }
    }

    /// No verdict could be reached. `elapsed` is `None` when no request went out.
    #[must_use]
    pub fn unknown(
        username: impl Into<String>,
        site_name: impl Into<String>,
        target_url: impl Into<String>,
        elapsed: Option<Duration>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            site_name: site_name.into(),
            target_url: target_url.into(),
            status: ProbeStatus::Unknown,
            elapsed,
            context: Some(context.into()),
        }
    }

    /// Username that was probed.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Site the probe targeted.
    #[must_use]
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /// Profile URL for the username on this site.
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Final status.
    #[must_use]
    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    /// Wall time spent on the probe, including retries.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Why the probe ended `Unknown`.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Shorthand for `status() == Claimed`.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.status == ProbeStatus::Claimed
    }
}
