//! Console output.

use handlescan_probe::{NotificationSink, ProbeResult, ProbeStatus, SessionSummary};

/// Prints progress to stdout as results arrive.
pub struct ConsoleSink {
    print_all: bool,
}

impl ConsoleSink {
    pub fn new(print_all: bool) -> Self {
        Self { print_all }
    }

    fn line(result: &ProbeResult) -> String {
        match result.status() {
            ProbeStatus::Claimed => format!("[+] {}: {}", result.site_name(), result.target_url()),
            ProbeStatus::Available => format!("[-] {}: Not Found!", result.site_name()),
            ProbeStatus::Illegal => {
                format!("[-] {}: Illegal Username Format For This Site!", result.site_name())
            }
            ProbeStatus::Unknown => format!(
                "[-] {}: {}",
                result.site_name(),
                result.context().unwrap_or("unknown error")
            ),
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn start(&self, username: &str) {
        println!("[*] Checking username {username} on:");
    }

    fn update(&self, result: &ProbeResult) {
        if self.print_all || result.is_claimed() {
            println!("{}", Self::line(result));
        }
    }

    fn finish(&self, summary: &SessionSummary) {
        let claimed = summary.count(ProbeStatus::Claimed);
        if summary.cancelled {
            println!("[*] Search interrupted with {claimed} results");
        } else {
            println!("[*] Search completed with {claimed} results");
        }
        if !summary.unmatched_sites.is_empty() {
            println!("[!] Sites not found: {}", summary.unmatched_sites.join(", "));
        }
    }
}
