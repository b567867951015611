//! Connectivity detection.
//!
//! A probe set runs an ordered list of independent strategies - HTTP
//! reachability, single-packet ping, DNS resolution - and reports online
//! on the first success. Individual strategy failures (including
//! timeouts) are absorbed; only "all strategies failed" surfaces, as a
//! plain `false`.

use std::net::ToSocketAddrs;
use std::process::Command;
use std::time::Duration;

use crate::exec;

/// Well-known HTTP endpoints; any non-5xx response proves connectivity.
const HTTP_ENDPOINTS: &[&str] = &[
    "https://www.google.com",
    "https://www.cloudflare.com",
    "https://www.github.com",
    "https://1.1.1.1",
];

/// Well-known resolver addresses for ping probes.
const PING_GOOGLE_DNS: &str = "8.8.8.8";
const PING_CLOUDFLARE_DNS: &str = "1.1.1.1";

/// Hostname resolved by the DNS probe.
const DNS_PROBE_HOST: &str = "google.com";

/// Boolean connectivity signal consumed by the scheduler.
pub trait Connectivity {
    fn is_reachable(&self) -> bool;
}

/// One reachability strategy.
pub trait ProbeStrategy {
    fn name(&self) -> &'static str;

    /// True when the strategy observed connectivity. Errors and timeouts
    /// are failed attempts, never panics or propagated errors.
    fn check(&self) -> bool;
}

/// Platform capability descriptor for the ping syntax, selected once at
/// startup instead of re-branched per call.
#[derive(Debug, Clone, Copy)]
pub struct PingCapability {
    pub program: &'static str,
    pub count_flag: &'static str,
}

impl PingCapability {
    pub fn host_default() -> Self {
        if cfg!(windows) {
            PingCapability {
                program: "ping",
                count_flag: "-n",
            }
        } else {
            PingCapability {
                program: "ping",
                count_flag: "-c",
            }
        }
    }
}

/// HTTP GET against a fixed list of well-known hosts.
pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        HttpProbe { timeout }
    }
}

impl ProbeStrategy for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    fn check(&self) -> bool {
        for url in HTTP_ENDPOINTS {
            match ureq::get(url).timeout(self.timeout).call() {
                Ok(_) => return true,
                // A 4xx still means the network path works.
                Err(ureq::Error::Status(code, _)) if code < 500 => return true,
                Err(_) => continue,
            }
        }
        false
    }
}

/// Single-packet ping to a well-known address.
pub struct PingProbe {
    name: &'static str,
    target: &'static str,
    capability: PingCapability,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(
        name: &'static str,
        target: &'static str,
        capability: PingCapability,
        timeout: Duration,
    ) -> Self {
        PingProbe {
            name,
            target,
            capability,
            timeout,
        }
    }
}

impl ProbeStrategy for PingProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check(&self) -> bool {
        let mut cmd = Command::new(self.capability.program);
        cmd.args([self.capability.count_flag, "1", self.target]);
        match exec::run_with_timeout(cmd, self.timeout) {
            Ok(out) => out.success(),
            Err(_) => false,
        }
    }
}

/// DNS resolution of a well-known name.
///
/// `ToSocketAddrs` has no timeout of its own, so resolution runs on a
/// helper thread and the probe waits a bounded time for its answer. A
/// late answer is discarded along with the thread.
pub struct DnsProbe {
    host: &'static str,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(host: &'static str, timeout: Duration) -> Self {
        DnsProbe { host, timeout }
    }
}

impl ProbeStrategy for DnsProbe {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn check(&self) -> bool {
        let (tx, rx) = crossbeam::channel::bounded(1);
        let host = self.host;
        std::thread::spawn(move || {
            let resolved = (host, 80u16).to_socket_addrs().is_ok();
            let _ = tx.send(resolved);
        });
        matches!(rx.recv_timeout(self.timeout), Ok(true))
    }
}

/// Ordered probe strategies with first-success short-circuit.
pub struct ProbeSet {
    strategies: Vec<Box<dyn ProbeStrategy>>,
}

impl ProbeSet {
    pub fn new(strategies: Vec<Box<dyn ProbeStrategy>>) -> Self {
        ProbeSet { strategies }
    }

    /// The default strategy order: HTTP, ping x2, DNS.
    pub fn host_default(timeout: Duration) -> Self {
        let capability = PingCapability::host_default();
        ProbeSet::new(vec![
            Box::new(HttpProbe::new(timeout)),
            Box::new(PingProbe::new(
                "ping-google-dns",
                PING_GOOGLE_DNS,
                capability,
                timeout,
            )),
            Box::new(PingProbe::new(
                "ping-cloudflare-dns",
                PING_CLOUDFLARE_DNS,
                capability,
                timeout,
            )),
            Box::new(DnsProbe::new(DNS_PROBE_HOST, timeout)),
        ])
    }
}

impl Connectivity for ProbeSet {
    fn is_reachable(&self) -> bool {
        for strategy in &self.strategies {
            if strategy.check() {
                tracing::debug!(strategy = strategy.name(), "connectivity detected");
                return true;
            }
            tracing::trace!(strategy = strategy.name(), "probe failed");
        }
        tracing::debug!("all connectivity probes failed");
        false
    }
}
