//! # Lookup Service Library
//!
//! Classifies a free-form query as a domain, an IP address or an AS number,
//! fetches it from the matching upstream and normalizes the answer.
//!
//! ## Features
//!
//! - Syntactic query classification (ASN, IPv4/IPv6 with optional CIDR, domain)
//! - Direct port-43 WHOIS with referral following and TLD server discovery
//! - Best-effort WHOIS text parsing, including the sectioned `.eu` layout
//! - IP address extraction from DNS and from the WHOIS text itself
//! - Optional caching of complete lookup responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lookup_service::LookupClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LookupClient::new().await?;
//!     let result = client.lookup("example.com").await?;
//!
//!     println!("Type: {}", result.query_type);
//!     println!("{}", serde_json::to_string_pretty(&result.data)?);
//!
//!     Ok(())
//! }
//! ```

pub mod buffer_pool;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod parser;
pub mod response;
pub mod tld_mappings;
pub mod upstream;
pub mod whois;

// Re-export main types for easy access
pub use cache::CacheService;
pub use classifier::{classify, QueryClassification};
pub use config::Config;
pub use errors::LookupError;
pub use extractor::{AddressResolver, DnsResolver, IpExtractor};
pub use parser::{Dialect, WhoisParser};
pub use response::DomainResponse;
pub use whois::{WhoisResult, WhoisService};

use classifier::{asn_number, strip_brackets};
use extractor::UnavailableResolver;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use upstream::UpstreamClient;

/// Addresses associated with a domain, deduplicated in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddresses {
    pub v4: Vec<String>,
    pub v6: Vec<String>,
}

impl IpAddresses {
    pub fn push_v4(&mut self, ip: String) {
        if !self.v4.contains(&ip) {
            self.v4.push(ip);
        }
    }

    pub fn push_v6(&mut self, ip: String) {
        if !self.v6.contains(&ip) {
            self.v6.push(ip);
        }
    }

    pub fn merge(&mut self, other: IpAddresses) {
        other.v4.into_iter().for_each(|ip| self.push_v4(ip));
        other.v6.into_iter().for_each(|ip| self.push_v6(ip));
    }
}

/// Normalized view of one WHOIS response.
///
/// Absent values are empty strings or empty collections, never missing.
/// Dates are kept exactly as the registry wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRecord {
    pub domain_name: String,
    pub registrar: String,
    pub creation_date: String,
    pub expiration_date: String,
    pub last_updated: String,
    pub status: Vec<String>,
    pub nameservers: Vec<String>,
    pub ip_addresses: IpAddresses,
    pub raw: String,
}

impl WhoisRecord {
    pub fn empty(domain: &str, raw: &str) -> Self {
        Self {
            domain_name: domain.to_string(),
            registrar: String::new(),
            creation_date: String::new(),
            expiration_date: String::new(),
            last_updated: String::new(),
            status: Vec::new(),
            nameservers: Vec::new(),
            ip_addresses: IpAddresses::default(),
            raw: raw.to_string(),
        }
    }
}

/// Payload of a lookup: a normalized domain record, or the upstream JSON for
/// IP and ASN queries.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LookupData {
    Domain(Box<DomainResponse>),
    Passthrough(serde_json::Value),
}

/// Response structure for lookups
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    #[serde(rename = "type")]
    pub query_type: QueryClassification,
    pub data: LookupData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_server: Option<String>,
    pub cached: bool,
    pub query_time_ms: u64,
}

/// High-level lookup client with optional caching
#[derive(Clone)]
pub struct LookupClient {
    whois: Arc<WhoisService>,
    upstream: Arc<UpstreamClient>,
    parser: Arc<WhoisParser>,
    cache: Option<Arc<CacheService>>,
}

impl LookupClient {
    /// Create a new lookup client with default configuration
    pub async fn new() -> Result<Self, LookupError> {
        let config = Arc::new(Config::load()?);
        Self::new_with_config(config).await
    }

    /// Create a new lookup client with custom configuration
    pub async fn new_with_config(config: Arc<Config>) -> Result<Self, LookupError> {
        let mut client = Self::build(config.clone(), Self::system_resolver(&config))?;
        client.cache = Some(Arc::new(CacheService::new(config)));
        Ok(client)
    }

    /// Create a new lookup client without caching
    pub async fn new_without_cache() -> Result<Self, LookupError> {
        let config = Arc::new(Config::load()?);
        Self::build(config.clone(), Self::system_resolver(&config))
    }

    /// Create a client without caching that resolves domains through `resolver`.
    pub fn with_resolver(config: Arc<Config>, resolver: Arc<dyn AddressResolver>) -> Result<Self, LookupError> {
        Self::build(config, resolver)
    }

    fn build(config: Arc<Config>, resolver: Arc<dyn AddressResolver>) -> Result<Self, LookupError> {
        Ok(Self {
            whois: Arc::new(WhoisService::new(config.clone())),
            upstream: Arc::new(UpstreamClient::new(&config)?),
            parser: Arc::new(WhoisParser::new(IpExtractor::new(resolver))),
            cache: None,
        })
    }

    fn system_resolver(config: &Config) -> Arc<dyn AddressResolver> {
        match DnsResolver::new(Duration::from_secs(config.dns_timeout_seconds)) {
            Ok(resolver) => Arc::new(resolver),
            Err(e) => {
                tracing::warn!("DNS resolver unavailable, address lookups disabled: {}", e);
                Arc::new(UnavailableResolver)
            }
        }
    }

    /// Perform a lookup for the given query
    ///
    /// IP and ASN answers come from the cache when one is configured.
    pub async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        self.lookup_with_options(query, false).await
    }

    /// Perform a fresh lookup, bypassing cache
    pub async fn lookup_fresh(&self, query: &str) -> Result<LookupResponse, LookupError> {
        self.lookup_with_options(query, true).await
    }

    /// Classify the query, dispatch it to its upstream and normalize the answer.
    pub async fn lookup_with_options(&self, query: &str, fresh: bool) -> Result<LookupResponse, LookupError> {
        let start_time = std::time::Instant::now();
        let query = query.trim();
        let query_type = classify(query);

        if query_type == QueryClassification::Unknown {
            return Err(LookupError::InvalidQuery(query.to_string()));
        }

        let cache = self.response_cache(query_type);
        let cache_key = format!("{}:{}", query_type, query.to_lowercase());

        if !fresh {
            if let Some(cache) = cache {
                if let Some(cached_result) = cache.get(&cache_key).await {
                    return Ok(cached_result);
                }
            }
        }

        let (data, whois_server) = match query_type {
            QueryClassification::Whois => {
                let (record, server) = self.lookup_domain(strip_brackets(query)).await?;
                (LookupData::Domain(Box::new(record)), Some(server))
            }
            QueryClassification::Ip => {
                let data = self.upstream.lookup_ip(strip_brackets(query)).await;
                (LookupData::Passthrough(data.map_err(|e| e.for_kind(query_type))?), None)
            }
            QueryClassification::Asn => {
                let data = self.upstream.lookup_asn(asn_number(query)).await;
                (LookupData::Passthrough(data.map_err(|e| e.for_kind(query_type))?), None)
            }
            QueryClassification::Unknown => return Err(LookupError::InvalidQuery(query.to_string())),
        };

        let response = LookupResponse {
            query_type,
            data,
            whois_server,
            cached: false,
            query_time_ms: start_time.elapsed().as_millis() as u64,
        };

        if let Some(cache) = cache {
            cache.set(&cache_key, &response).await;
        }

        Ok(response)
    }

    async fn lookup_domain(&self, query: &str) -> Result<(DomainResponse, String), LookupError> {
        let domain = query.to_lowercase();
        let result = self
            .whois
            .query(&domain)
            .await
            .map_err(|e| e.for_kind(QueryClassification::Whois))?;

        let record = self.parser.parse(&result.raw_data, &domain).await;
        Ok((DomainResponse::from_record(&record, query), result.server))
    }

    // WHOIS records are built per request and never stored; only the
    // IP and ASN passthroughs go through the cache.
    fn response_cache(&self, query_type: QueryClassification) -> Option<&CacheService> {
        match query_type {
            QueryClassification::Ip | QueryClassification::Asn => self.cache.as_deref(),
            QueryClassification::Whois | QueryClassification::Unknown => None,
        }
    }

    /// Parse raw WHOIS text for `domain` with this client's resolver.
    pub async fn parse_whois(&self, raw_text: &str, domain: &str) -> WhoisRecord {
        self.parser.parse(raw_text, domain).await
    }

    /// Whether responses are cached
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}
