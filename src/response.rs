use crate::{IpAddresses, WhoisRecord};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
    pub ldh_name: String,
    pub handle: String,
    pub status: Vec<String>,
    pub ip_addresses: IpAddresses,
    pub events: Vec<Event>,
    pub nameservers: Vec<Nameserver>,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_action: String,
    pub event_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Nameserver {
    pub ldh_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub roles: Vec<String>,
    pub vcard_array: Value,
}

impl DomainResponse {
    /// `handle` is the query exactly as the user typed it.
    pub fn from_record(record: &WhoisRecord, handle: &str) -> Self {
        let event = |action: &str, date: &str| Event {
            event_action: action.to_string(),
            event_date: date.to_string(),
        };

        Self {
            ldh_name: record.domain_name.clone(),
            handle: handle.to_string(),
            status: record.status.clone(),
            ip_addresses: record.ip_addresses.clone(),
            events: vec![
                event("registration", &record.creation_date),
                event("expiration", &record.expiration_date),
                event("last changed", &record.last_updated),
            ],
            nameservers: record
                .nameservers
                .iter()
                .map(|ns| Nameserver { ldh_name: ns.clone() })
                .collect(),
            entities: vec![Entity::registrar(&record.registrar)],
        }
    }
}

impl Entity {
    /// Registrar entity with a minimal jCard: version, formatted name, empty email.
    pub fn registrar(name: &str) -> Self {
        Self {
            roles: vec!["registrar".to_string()],
            vcard_array: json!([
                "vcard",
                [
                    ["version", {}, "text", "4.0"],
                    ["fn", {}, "text", name],
                    ["email", {}, "text", ""]
                ]
            ]),
        }
    }
}
