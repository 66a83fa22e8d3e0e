use crate::{errors::LookupError, IpAddresses};
use async_trait::async_trait;
use hickory_resolver::{Resolver, TokioResolver};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::debug;

/// Lowercased substrings that mark a WHOIS line as worth scanning for addresses.
const TRIGGERS: [&str; 6] = ["ip address", "a record", "aaaa record", "addresses", "host", "dns"];

static IPV4_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("Invalid IPv4 candidate regex")
});

// Shape only: this also accepts strings with several `::` runs.
static IPV6_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[0-9a-f]{0,4}:){2,7}[0-9a-f]{1,4}").expect("Invalid IPv6 candidate regex")
});

/// Forward resolution of a domain to its addresses.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve_a(&self, domain: &str) -> Result<Vec<String>, LookupError>;
    async fn resolve_aaaa(&self, domain: &str) -> Result<Vec<String>, LookupError>;
}

/// System-configured DNS resolver.
pub struct DnsResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl DnsResolver {
    pub fn new(timeout: Duration) -> Result<Self, LookupError> {
        let resolver = Resolver::builder_tokio()
            .map_err(|e| LookupError::Dns(format!("Failed to read system DNS config: {}", e)))?
            .build();

        Ok(Self { resolver, timeout })
    }
}

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve_a(&self, domain: &str) -> Result<Vec<String>, LookupError> {
        let records = timeout(self.timeout, self.resolver.ipv4_lookup(domain))
            .await?
            .map_err(|e| LookupError::Dns(e.to_string()))?;

        Ok(records.iter().map(|a| a.0.to_string()).collect())
    }

    async fn resolve_aaaa(&self, domain: &str) -> Result<Vec<String>, LookupError> {
        let records = timeout(self.timeout, self.resolver.ipv6_lookup(domain))
            .await?
            .map_err(|e| LookupError::Dns(e.to_string()))?;

        Ok(records.iter().map(|aaaa| aaaa.0.to_string()).collect())
    }
}

/// Stand-in used when no system resolver could be built; every lookup fails
/// and is therefore ignored.
pub struct UnavailableResolver;

#[async_trait]
impl AddressResolver for UnavailableResolver {
    async fn resolve_a(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Dns("resolver unavailable".to_string()))
    }

    async fn resolve_aaaa(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Dns("resolver unavailable".to_string()))
    }
}

#[derive(Clone)]
pub struct IpExtractor {
    resolver: Arc<dyn AddressResolver>,
}

impl IpExtractor {
    pub fn new(resolver: Arc<dyn AddressResolver>) -> Self {
        Self { resolver }
    }

    /// Resolved addresses first, then anything found in the WHOIS text.
    /// Each address family fails independently and degrades to nothing.
    pub async fn extract(&self, whois_text: &str, domain: &str) -> IpAddresses {
        let (v4, v6) = futures::join!(
            self.resolver.resolve_a(domain),
            self.resolver.resolve_aaaa(domain)
        );

        let mut addresses = IpAddresses::default();
        for ip in v4.unwrap_or_else(|e| {
            debug!("A lookup failed for {}: {}", domain, e);
            Vec::new()
        }) {
            addresses.push_v4(ip);
        }
        for ip in v6.unwrap_or_else(|e| {
            debug!("AAAA lookup failed for {}: {}", domain, e);
            Vec::new()
        }) {
            addresses.push_v6(ip);
        }

        addresses.merge(scan_text(whois_text));
        addresses
    }
}

/// Heuristic scan of WHOIS text for address literals on host/DNS-related lines.
pub fn scan_text(whois_text: &str) -> IpAddresses {
    let mut addresses = IpAddresses::default();

    for line in whois_text.lines() {
        let lowered = line.to_lowercase();
        if !TRIGGERS.iter().any(|trigger| lowered.contains(trigger)) {
            continue;
        }

        for m in IPV4_CANDIDATE.find_iter(line) {
            addresses.push_v4(m.as_str().to_string());
        }
        for m in IPV6_CANDIDATE.find_iter(line) {
            addresses.push_v6(m.as_str().to_string());
        }
    }

    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResolver {
        v4: Result<Vec<&'static str>, ()>,
        v6: Result<Vec<&'static str>, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AddressResolver for FixedResolver {
        async fn resolve_a(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.v4
                .clone()
                .map(|ips| ips.into_iter().map(String::from).collect())
                .map_err(|_| LookupError::Dns("SERVFAIL".into()))
        }

        async fn resolve_aaaa(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.v6
                .clone()
                .map(|ips| ips.into_iter().map(String::from).collect())
                .map_err(|_| LookupError::Dns("SERVFAIL".into()))
        }
    }

    #[test]
    fn test_scan_ip_address_line() {
        let found = scan_text("Domain Name: example.com\nIP Address: 192.0.2.1\n");
        assert_eq!(found.v4, vec!["192.0.2.1"]);
        assert!(found.v6.is_empty());
    }

    #[test]
    fn test_scan_ipv4_needs_ascii_digits() {
        let found = scan_text("IP Address: \u{0661}\u{0669}\u{0662}.\u{0660}.\u{0662}.\u{0661}\nIP Address: 192.0.2.1");
        assert_eq!(found.v4, vec!["192.0.2.1"]);
    }

    #[test]
    fn test_scan_ignores_lines_without_triggers() {
        let found = scan_text("Registrar: Example 10.0.0.1\nCreation Date: 2020-01-01\n");
        assert!(found.v4.is_empty());
        assert!(found.v6.is_empty());
    }

    #[test]
    fn test_scan_finds_ipv6_and_dedups() {
        let text = "Host: ns1.example.com 2001:db8::53\n\
                    DNS: ns1.example.com 2001:db8::53 198.51.100.7\n\
                    Addresses: 198.51.100.7";
        let found = scan_text(text);
        assert_eq!(found.v4, vec!["198.51.100.7"]);
        assert_eq!(found.v6, vec!["2001:db8::53"]);
    }

    #[test]
    fn test_scan_trigger_is_case_insensitive() {
        let found = scan_text("A RECORD    203.0.113.9");
        assert_eq!(found.v4, vec!["203.0.113.9"]);
    }

    #[tokio::test]
    async fn test_extract_text_survives_dns_failure() {
        let resolver = Arc::new(FixedResolver {
            v4: Err(()),
            v6: Err(()),
            calls: AtomicUsize::new(0),
        });
        let extractor = IpExtractor::new(resolver.clone());

        let found = extractor.extract("IP Address: 192.0.2.1", "example.com").await;

        assert_eq!(found.v4, vec!["192.0.2.1"]);
        assert!(found.v6.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_extract_one_family_failing_keeps_the_other() {
        let resolver = Arc::new(FixedResolver {
            v4: Err(()),
            v6: Ok(vec!["2001:db8::1"]),
            calls: AtomicUsize::new(0),
        });
        let extractor = IpExtractor::new(resolver);

        let found = extractor.extract("", "example.com").await;

        assert!(found.v4.is_empty());
        assert_eq!(found.v6, vec!["2001:db8::1"]);
    }

    #[test]
    fn test_extract_merges_resolved_and_scanned() {
        let resolver = Arc::new(FixedResolver {
            v4: Ok(vec!["192.0.2.1", "192.0.2.2"]),
            v6: Ok(vec![]),
            calls: AtomicUsize::new(0),
        });
        let extractor = IpExtractor::new(resolver);

        let found = tokio_test::block_on(
            extractor.extract("IP Address: 192.0.2.2\nIP Address: 192.0.2.3", "example.com"),
        );

        assert_eq!(found.v4, vec!["192.0.2.1", "192.0.2.2", "192.0.2.3"]);
    }

    #[tokio::test]
    async fn test_unavailable_resolver_degrades_to_empty() {
        let extractor = IpExtractor::new(Arc::new(UnavailableResolver));
        let found = extractor.extract("nothing here", "example.com").await;
        assert_eq!(found, IpAddresses::default());
    }
}
