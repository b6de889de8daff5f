#![allow(dead_code)]

use async_trait::async_trait;
use handlescan_probe::{CapturedResponse, HttpTransport, ProbeRequest, TransportError};
use handlescan_sites::{DetectionRule, SiteDefinition, SiteRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted transport does for a URL.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(CapturedResponse),
    Fail(TransportError),
}

/// Transport answering from a per-URL script, with a fixed delay per call.
///
/// Tracks how many calls overlap so tests can check the in-flight limit.
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    fallback: Script,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(fallback: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("acquire calls lock").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &ProbeRequest) -> Result<CapturedResponse, TransportError> {
        self.calls
            .lock()
            .expect("acquire calls lock")
            .push(request.url.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripts.get(&request.url).unwrap_or(&self.fallback) {
            Script::Respond(response) => Ok(response.clone()),
            Script::Fail(error) => Err(error.clone()),
        }
    }
}

pub fn ok(url: &str) -> Script {
    Script::Respond(CapturedResponse::new(200, url, "<html>profile</html>"))
}

pub fn status_site(name: &str) -> SiteDefinition {
    SiteDefinition::new(
        name,
        format!("https://{}.test/", name.to_lowercase()),
        format!("https://{}.test/{{}}", name.to_lowercase()),
        DetectionRule::StatusCode {
            error_codes: vec![404],
        },
        "alice",
    )
    .expect("valid definition")
}

pub fn numbered_registry(count: usize) -> Arc<SiteRegistry> {
    let registry = SiteRegistry::from_definitions((0..count).map(|i| status_site(&format!("site{i:02}"))))
        .expect("valid registry");
    Arc::new(registry)
}
