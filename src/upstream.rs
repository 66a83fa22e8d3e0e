use crate::{classifier::QueryClassification, config::Config, errors::LookupError};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const ASN_API_BASE: &str = "https://api.bgpview.io/asn/";

struct IpProvider {
    name: &'static str,
    base: &'static str,
    trailing: &'static [&'static str],
}

// Tried in order; the first provider with a usable answer wins.
const IP_PROVIDERS: [IpProvider; 3] = [
    IpProvider { name: "ipapi.co", base: "https://ipapi.co/", trailing: &["json", ""] },
    IpProvider { name: "ipwho.is", base: "https://ipwho.is/", trailing: &[] },
    IpProvider { name: "ip-api.com", base: "http://ip-api.com/json/", trailing: &[] },
];

impl IpProvider {
    fn url_for(&self, ip: &str) -> Result<Url, LookupError> {
        let mut url = Url::parse(self.base)
            .map_err(|e| LookupError::Internal(format!("Invalid provider URL '{}': {}", self.base, e)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Internal(format!("Provider URL '{}' cannot take a path", self.base)))?
            .pop_if_empty()
            .push(ip)
            .extend(self.trailing);
        Ok(url)
    }
}

pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .user_agent(concat!("lookup-service/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self { client })
    }

    /// Geolocate an address. A CIDR suffix is dropped; providers want a host.
    pub async fn lookup_ip(&self, query: &str) -> Result<Value, LookupError> {
        let ip = query.split('/').next().unwrap_or(query);
        let mut last_error = LookupError::NotFound(QueryClassification::Ip);

        for provider in &IP_PROVIDERS {
            let result = self.fetch_json(provider.url_for(ip)?, QueryClassification::Ip).await;

            match result {
                Ok(mut body) if !reports_failure(&body) => {
                    if let Some(object) = body.as_object_mut() {
                        object.insert("source".to_string(), Value::from(provider.name));
                    }
                    return Ok(body);
                }
                Ok(body) => {
                    debug!("{} could not locate {}: {}", provider.name, ip, body);
                }
                Err(e) => {
                    warn!("IP provider {} failed for {}: {}", provider.name, ip, e);
                    // A real failure outranks "not found" from an earlier provider
                    if !matches!(e, LookupError::NotFound(_)) {
                        last_error = e;
                    }
                }
            }
        }

        Err(last_error)
    }

    pub async fn lookup_asn(&self, number: &str) -> Result<Value, LookupError> {
        let url = Url::parse(ASN_API_BASE)
            .and_then(|base| base.join(number))
            .map_err(|e| LookupError::Internal(format!("Failed to construct ASN URL: {}", e)))?;

        self.fetch_json(url, QueryClassification::Asn).await
    }

    async fn fetch_json(&self, url: Url, kind: QueryClassification) -> Result<Value, LookupError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(from_reqwest)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(kind));
        }
        if !status.is_success() {
            return Err(LookupError::Upstream {
                kind,
                details: format!("upstream responded with status {}", status),
            });
        }

        response.json().await.map_err(from_reqwest)
    }
}

fn from_reqwest(error: reqwest::Error) -> LookupError {
    if error.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::HttpError(error)
    }
}

/// Providers answer 200 with an error flag in the body rather than a status code.
fn reports_failure(body: &Value) -> bool {
    body["error"] == true || body["success"] == false || body["status"] == "fail"
}
