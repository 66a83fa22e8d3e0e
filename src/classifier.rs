use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const HEXTET: &str = "[0-9a-f]{1,4}";
const OCTET: &str = "(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])";

static ASN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:AS)?[0-9]+$").expect("Invalid ASN regex"));

static IPV4_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:{o}\.){{3}}{o}(?:/(?:3[0-2]|[12]?[0-9]))?$",
        o = OCTET
    ))
    .expect("Invalid IPv4 regex")
});

static IPV6_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let h = HEXTET;
    let v4 = format!(r"(?:{o}\.){{3}}{o}", o = OCTET);
    let forms = [
        format!("(?:{h}:){{7}}{h}"),
        format!("(?:{h}:){{1,7}}:"),
        format!("(?:{h}:){{1,6}}:{h}"),
        format!("(?:{h}:){{1,5}}(?::{h}){{1,2}}"),
        format!("(?:{h}:){{1,4}}(?::{h}){{1,3}}"),
        format!("(?:{h}:){{1,3}}(?::{h}){{1,4}}"),
        format!("(?:{h}:){{1,2}}(?::{h}){{1,5}}"),
        format!("{h}:(?::{h}){{1,6}}"),
        format!(":(?:(?::{h}){{1,7}}|:)"),
        "fe80:(?::[0-9a-f]{0,4}){0,4}%[0-9a-z]+".to_string(),
        format!("::(?:ffff(?::0{{1,4}})?:)?{v4}"),
        format!("(?:{h}:){{1,4}}:{v4}"),
    ];
    Regex::new(&format!(
        r"(?i)^(?:{})(?:/(?:12[0-8]|1[01][0-9]|[1-9]?[0-9]))?$",
        forms.join("|")
    ))
    .expect("Invalid IPv6 regex")
});

/// What kind of upstream source a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClassification {
    Asn,
    Ip,
    Whois,
    Unknown,
}

impl QueryClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryClassification::Asn => "asn",
            QueryClassification::Ip => "ip",
            QueryClassification::Whois => "whois",
            QueryClassification::Unknown => "unknown",
        }
    }

    /// Upper-case label used in user-facing error messages ("WHOIS not found").
    pub fn label(&self) -> &'static str {
        match self {
            QueryClassification::Asn => "ASN",
            QueryClassification::Ip => "IP",
            QueryClassification::Whois => "WHOIS",
            QueryClassification::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QueryClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw query. First matching rule wins:
/// ASN, then IPv6, then IPv4, then anything containing a dot.
pub fn classify(input: &str) -> QueryClassification {
    let query = strip_brackets(input);

    if ASN_PATTERN.is_match(query) {
        QueryClassification::Asn
    } else if IPV6_PATTERN.is_match(query) || IPV4_PATTERN.is_match(query) {
        QueryClassification::Ip
    } else if query.contains('.') {
        QueryClassification::Whois
    } else {
        QueryClassification::Unknown
    }
}

/// Remove one pair of surrounding brackets (`[2001:db8::1]`), if both are present.
pub fn strip_brackets(input: &str) -> &str {
    input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(input)
}

/// The bare AS number, without brackets or a case-insensitive `AS` prefix.
pub fn asn_number(input: &str) -> &str {
    let query = strip_brackets(input);
    match query.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &query[2..],
        _ => query,
    }
}
