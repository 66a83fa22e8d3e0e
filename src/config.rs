use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub site_title: String,
    pub whois_timeout_seconds: u64,
    pub max_referrals: usize,
    pub whois_server: Option<String>,
    pub max_response_size: usize,
    pub dns_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub concurrent_whois_queries: usize,
    pub buffer_pool_size: usize, // Max buffers in pool
    pub buffer_size: usize,      // Size of each buffer
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub site_title: String,
    pub whois_timeout_seconds: u64,
    pub max_referrals: usize,
    #[serde(default)]
    pub whois_server: Option<String>,
    pub max_response_size: usize,
    pub dns_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub concurrent_whois_queries: usize,
    pub buffer_pool_size: usize,
    pub buffer_size: usize,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let memory_gb = Self::get_available_memory() / (1024 * 1024 * 1024);

        let mut settings = config::Config::builder()
            .set_default("port", 3000)?
            .set_default("site_title", "DumbWhois")?
            .set_default("whois_timeout_seconds", 10)?
            .set_default("max_referrals", 3)?
            .set_default("max_response_size", 1024 * 1024)?
            .set_default("dns_timeout_seconds", 5)?
            .set_default("http_timeout_seconds", 10)?
            .set_default("cache_ttl_seconds", if Self::is_production_environment() { 3600 } else { 600 })?
            .set_default("cache_max_entries", Self::calculate_cache_size(memory_gb))?
            .set_default("concurrent_whois_queries", Self::get_cpu_cores().min(8) as i64)?
            .set_default("buffer_pool_size", Self::calculate_buffer_pool_size(memory_gb) as i64)?
            .set_default("buffer_size", 8192)?;

        // Override with environment variables if present
        settings = Self::apply_env_overrides(settings)?;

        let data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            port: data.port,
            site_title: data.site_title,
            whois_timeout_seconds: data.whois_timeout_seconds,
            max_referrals: data.max_referrals,
            whois_server: data.whois_server.filter(|server| !server.trim().is_empty()),
            max_response_size: data.max_response_size,
            dns_timeout_seconds: data.dns_timeout_seconds,
            http_timeout_seconds: data.http_timeout_seconds,
            cache_ttl_seconds: data.cache_ttl_seconds,
            cache_max_entries: data.cache_max_entries,
            concurrent_whois_queries: data.concurrent_whois_queries.max(1),
            buffer_pool_size: data.buffer_pool_size,
            buffer_size: data.buffer_size.max(512),
            start_time: Instant::now(),
        })
    }

    fn get_available_memory() -> u64 {
        #[cfg(target_os = "linux")]
        {
            if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
                let available_kb = meminfo
                    .lines()
                    .find(|line| line.starts_with("MemAvailable:"))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok());
                if let Some(kb) = available_kb {
                    return kb * 1024;
                }
            }
        }

        // Default fallback: assume 4GB
        4 * 1024 * 1024 * 1024
    }

    fn get_cpu_cores() -> usize {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4)
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
            .unwrap_or(false)
    }

    fn calculate_cache_size(memory_gb: u64) -> u64 {
        match memory_gb {
            0..=2 => 500,
            3..=8 => 2000,
            _ => 5000,
        }
    }

    fn calculate_buffer_pool_size(memory_gb: u64) -> usize {
        match memory_gb {
            0..=2 => 8,
            3..=8 => 32,
            _ => 64,
        }
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("PORT", "port"),
            ("SITE_TITLE", "site_title"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("MAX_REFERRALS", "max_referrals"),
            ("WHOIS_SERVER", "whois_server"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("DNS_TIMEOUT_SECONDS", "dns_timeout_seconds"),
            ("HTTP_TIMEOUT_SECONDS", "http_timeout_seconds"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("CONCURRENT_WHOIS_QUERIES", "concurrent_whois_queries"),
            ("BUFFER_POOL_SIZE", "buffer_pool_size"),
            ("BUFFER_SIZE", "buffer_size"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}
