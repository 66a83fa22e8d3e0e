use crate::{
    buffer_pool::BufferPool, classifier::QueryClassification, config::Config, errors::LookupError,
    tld_mappings::known_server,
};
use once_cell::sync::Lazy;
use publicsuffix::{List, Psl};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{RwLock, Semaphore},
    time::timeout,
};
use tracing::{debug, info, warn};

// Global PSL instance - shared across all service instances
static PSL: Lazy<List> = Lazy::new(List::new);

const ROOT_WHOIS_SERVER: &str = "whois.iana.org";

/// Line prefixes (lowercased) registries use to say nothing is registered.
const NOT_FOUND_MARKERS: [&str; 8] = [
    "no match for",
    "no match!!",
    "not found",
    "no entries found",
    "no data found",
    "domain not found",
    "status: available",
    "%error:101: no entries found",
];

pub struct WhoisService {
    config: Arc<Config>,
    tld_servers: RwLock<HashMap<String, String>>,
    query_semaphore: Semaphore,
    buffer_pool: BufferPool,
}

pub struct WhoisResult {
    pub server: String,
    pub raw_data: String,
}

impl WhoisService {
    pub fn new(config: Arc<Config>) -> Self {
        info!(
            "WhoisService initialized: timeout {}s, up to {} referrals, buffer pool {} x {} bytes",
            config.whois_timeout_seconds, config.max_referrals, config.buffer_pool_size, config.buffer_size
        );

        Self {
            tld_servers: RwLock::new(HashMap::new()),
            query_semaphore: Semaphore::new(config.concurrent_whois_queries),
            buffer_pool: BufferPool::new(config.buffer_size, config.buffer_pool_size),
            config,
        }
    }

    /// Fetch the raw WHOIS text for `domain`, following referrals.
    ///
    /// The whole exchange, discovery and referrals included, is bounded by
    /// the configured WHOIS timeout.
    pub async fn query(&self, domain: &str) -> Result<WhoisResult, LookupError> {
        let budget = Duration::from_secs(self.config.whois_timeout_seconds);
        timeout(budget, self.query_inner(domain)).await?
    }

    async fn query_inner(&self, domain: &str) -> Result<WhoisResult, LookupError> {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();

        if domain.is_empty() || !domain.contains('.') {
            return Err(LookupError::InvalidQuery(domain));
        }

        let whois_server = match &self.config.whois_server {
            Some(server) => server.clone(),
            None => {
                let tld = self.extract_tld(&domain)?;
                self.find_whois_server(&tld).await?
            }
        };

        let raw_data = self.raw_whois_query(&whois_server, &domain).await?;
        let (server, raw_data) = self.follow_referrals(whois_server, raw_data, &domain).await;

        if is_not_found(&raw_data) {
            debug!("{} reports no match for {}", server, domain);
            return Err(LookupError::NotFound(QueryClassification::Whois));
        }

        Ok(WhoisResult { server, raw_data })
    }

    /// Extract TLD from domain using global PSL for accurate parsing
    fn extract_tld(&self, domain: &str) -> Result<String, LookupError> {
        if let Some(parsed) = PSL.domain(domain.as_bytes()) {
            if let Ok(suffix) = std::str::from_utf8(parsed.suffix().as_bytes()) {
                return Ok(suffix.to_string());
            }
        }

        warn!("Public suffix parsing failed for {}, using last label", domain);
        domain
            .rsplit('.')
            .next()
            .filter(|label| !label.is_empty())
            .map(String::from)
            .ok_or_else(|| LookupError::InvalidQuery(format!("No TLD found in domain: {}", domain)))
    }

    async fn find_whois_server(&self, tld: &str) -> Result<String, LookupError> {
        if let Some(server) = known_server(tld) {
            return Ok(server.to_string());
        }

        {
            let servers = self.tld_servers.read().await;
            if let Some(server) = servers.get(tld) {
                return Ok(server.clone());
            }
        }

        let server = match self.query_root_for_tld(tld).await {
            Some(server) => {
                info!("Discovered whois server via IANA for {}: {}", tld, server);
                server
            }
            None => {
                let guess = format!("whois.nic.{}", tld);
                warn!("No IANA referral for {}, trying {}", tld, guess);
                guess
            }
        };

        self.tld_servers.write().await.insert(tld.to_string(), server.clone());
        Ok(server)
    }

    async fn query_root_for_tld(&self, tld: &str) -> Option<String> {
        debug!("Querying {} for TLD: {}", ROOT_WHOIS_SERVER, tld);

        match self.raw_whois_query(ROOT_WHOIS_SERVER, tld).await {
            Ok(response) => extract_referral(&response),
            Err(e) => {
                debug!("Failed to query {} for {}: {}", ROOT_WHOIS_SERVER, tld, e);
                None
            }
        }
    }

    async fn raw_whois_query(&self, server: &str, query: &str) -> Result<String, LookupError> {
        let _permit = self
            .query_semaphore
            .acquire()
            .await
            .map_err(|_| LookupError::Internal("Semaphore error".to_string()))?;

        self.execute_whois_query(server, query).await
    }

    async fn execute_whois_query(&self, server: &str, query: &str) -> Result<String, LookupError> {
        let mut stream = TcpStream::connect((server, 43)).await?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        stream.write_all(format!("{}\r\n", query).as_bytes()).await?;

        let mut pooled_buffer = self.buffer_pool.checkout();
        let buffer = pooled_buffer.as_mut();
        let mut response = Vec::new();

        loop {
            let n = stream.read(buffer).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buffer[..n]);
            if response.len() > self.config.max_response_size {
                return Err(LookupError::ResponseTooLarge);
            }
        }

        // Plenty of registries still answer in Latin-1
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    /// Follow `refer:` / `Registrar WHOIS Server:` hops. A failed hop keeps
    /// the last good answer.
    async fn follow_referrals(&self, server: String, data: String, domain: &str) -> (String, String) {
        let mut current_server = server;
        let mut current_data = data;

        for _ in 0..self.config.max_referrals {
            let Some(referral) = extract_referral(&current_data) else {
                break;
            };
            if referral.eq_ignore_ascii_case(&current_server) {
                break;
            }

            debug!("Following referral from {} to {}", current_server, referral);
            match self.raw_whois_query(&referral, domain).await {
                Ok(new_data) if !new_data.trim().is_empty() => {
                    current_server = referral;
                    current_data = new_data;
                }
                Ok(_) => {
                    warn!("Referral server {} returned nothing for {}", referral, domain);
                    break;
                }
                Err(e) => {
                    warn!("Failed to query referral server {}: {}", referral, e);
                    break;
                }
            }
        }

        (current_server, current_data)
    }
}

/// Referral target named in a WHOIS response, as a bare hostname.
pub fn extract_referral(data: &str) -> Option<String> {
    data.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        let key = key.trim().to_lowercase();

        let is_referral = key == "refer" || key == "whois" || (key.contains("whois") && key.contains("server"));
        if !is_referral {
            return None;
        }

        let value = value.trim();
        let host = value.split_once("://").map_or(value, |(_, rest)| rest);
        let host = host.split(['/', ':']).next().unwrap_or_default().trim();

        if host.is_empty() || host.contains(char::is_whitespace) {
            None
        } else {
            Some(host.to_lowercase())
        }
    })
}

pub fn is_not_found(data: &str) -> bool {
    data.lines().any(|line| {
        let line = line.trim().to_lowercase();
        NOT_FOUND_MARKERS.iter().any(|marker| line.starts_with(marker))
    })
}
