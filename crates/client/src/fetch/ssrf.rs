//! SSRF (Server-Side Request Forgery) protection.
//!
//! Validates that URLs and resolved IP addresses are not pointing to
//! private, internal, or reserved addresses. The check runs before the
//! first fetch and again on every redirect destination; clearance for one
//! host never transfers to another.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use std::time::Duration;

use ipnet::{Ipv4Net, Ipv6Net};
use url::{Host, Url};

/// Hostnames rejected by name before any DNS step.
const LOCAL_HOSTNAMES: &[&str] =
    &["localhost", "localhost.localdomain", "localhost6", "localhost6.localdomain6"];

/// IPv4 ranges that must never be fetched, beyond what the std `Ipv4Addr`
/// predicates cover: CGNAT, the IETF protocol-assignments block, the
/// documentation nets, and the benchmark net.
static BLOCKED_V4_NETS: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    ["100.64.0.0/10", "192.0.0.0/24", "192.0.2.0/24", "198.18.0.0/15", "198.51.100.0/24", "203.0.113.0/24"]
        .iter()
        .map(|net| net.parse().expect("static CIDR literal"))
        .collect()
});

/// IPv6 documentation prefix (2001:db8::/32).
static BLOCKED_V6_NETS: LazyLock<Vec<Ipv6Net>> =
    LazyLock::new(|| vec!["2001:db8::/32".parse().expect("static CIDR literal")]);

/// Error type for SSRF validation failures.
///
/// Everything except `DnsFailed` maps to `Forbidden`; a disallowed DNS
/// failure is an upstream problem and maps to `ServiceUnavailable`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("access to local hostname denied: {0}")]
    BlockedHostname(String),

    #[error("access to private or reserved address denied: {0}")]
    BlockedIp(IpAddr),

    #[error("zone-indexed IPv6 literal not supported: {0}")]
    ZoneIndex(String),

    #[error("DNS resolves to private address: {host} -> {ip}")]
    PrivateResolution { host: String, ip: IpAddr },

    #[error("DNS resolution failed for {0}")]
    DnsFailed(String),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// Covers loopback, RFC 1918, link-local, CGNAT, the documentation and
/// benchmark nets, multicast, the class E/reserved block, broadcast,
/// unspecified, IPv6 unique-local, and IPv4-mapped IPv6 equivalents of all
/// of the above.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_blocked_v4(mapped);
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || BLOCKED_V6_NETS.iter().any(|net| net.contains(&v6))
        }
    }
}

fn is_blocked_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_multicast()
        || v4.is_broadcast()
        || v4.is_unspecified()
        || v4.octets()[0] == 0
        || v4.octets()[0] >= 240
        || BLOCKED_V4_NETS.iter().any(|net| net.contains(&v4))
}

fn is_local_hostname(hostname: &str) -> bool {
    LOCAL_HOSTNAMES.contains(&hostname) || hostname.ends_with(".localhost")
}

/// SSRF guard: clears a validated URL for outbound fetching.
///
/// Literal IPs are tested directly against the reserved table; hostnames
/// are resolved and every returned address must pass; a single private
/// answer rejects the whole lookup (DNS-rebinding defense).
#[derive(Debug, Clone)]
pub struct SsrfGuard {
    dns_timeout: Duration,
    allow_dns_failure: bool,
    allow_private_networks: bool,
}

impl SsrfGuard {
    pub fn new(dns_timeout: Duration, allow_dns_failure: bool, allow_private_networks: bool) -> Self {
        Self { dns_timeout, allow_dns_failure, allow_private_networks }
    }

    /// Clear a URL for fetching. Must be re-run against the destination of
    /// every followed redirect before that destination is contacted.
    pub async fn check(&self, url: &Url) -> Result<(), SsrfError> {
        let host = match url.host() {
            Some(host) => host,
            None => return Err(SsrfError::BlockedHostname("<missing host>".to_string())),
        };

        match host {
            Host::Ipv4(v4) => self.check_literal(IpAddr::V4(v4)),
            Host::Ipv6(v6) => self.check_literal(IpAddr::V6(v6)),
            Host::Domain(domain) => self.check_domain(domain).await,
        }
    }

    fn check_literal(&self, ip: IpAddr) -> Result<(), SsrfError> {
        if self.allow_private_networks {
            return Ok(());
        }
        if is_private_or_reserved(ip) {
            return Err(SsrfError::BlockedIp(ip));
        }
        Ok(())
    }

    async fn check_domain(&self, domain: &str) -> Result<(), SsrfError> {
        let name = domain.trim_end_matches('.').to_ascii_lowercase();

        // Zone indices (fe80::1%eth0) have no meaning for an outbound
        // gateway and are rejected rather than normalized.
        if name.contains('%') {
            return Err(SsrfError::ZoneIndex(name));
        }

        if is_local_hostname(&name) {
            return Err(SsrfError::BlockedHostname(name));
        }

        if self.allow_private_networks {
            return Ok(());
        }

        // The system resolver returns both A and AAAA records from one
        // call; every record must be public.
        let lookup = tokio::time::timeout(self.dns_timeout, tokio::net::lookup_host((name.as_str(), 80))).await;

        let addrs: Vec<IpAddr> = match lookup {
            Ok(Ok(addrs)) => addrs.map(|sa| sa.ip()).collect(),
            Ok(Err(e)) => return self.on_dns_failure(&name, &e.to_string()),
            Err(_) => return self.on_dns_failure(&name, "resolution timed out"),
        };

        if addrs.is_empty() {
            return self.on_dns_failure(&name, "no addresses returned");
        }

        for ip in addrs {
            if is_private_or_reserved(ip) {
                tracing::warn!(host = %name, %ip, "DNS answer in private range, rejecting");
                return Err(SsrfError::PrivateResolution { host: name.clone(), ip });
            }
        }

        Ok(())
    }

    fn on_dns_failure(&self, host: &str, reason: &str) -> Result<(), SsrfError> {
        if self.allow_dns_failure {
            tracing::warn!(%host, %reason, "DNS resolution failed, allowed by configuration");
            Ok(())
        } else {
            Err(SsrfError::DnsFailed(format!("{host}: {reason}")))
        }
    }
}
