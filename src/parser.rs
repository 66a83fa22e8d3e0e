use crate::{extractor::IpExtractor, WhoisRecord};
use tracing::debug;

/// Boilerplate line EURid appends to the name server block.
const EURID_BOILERPLATE: &str = "Please visit www.eurid.eu for more info.";

/// Section content in the `.eu` layout is indented by (at least) this much.
const SECTION_INDENT: &str = "        ";

/// Registry text layout, chosen from the domain suffix alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `Key: value` lines, the common gTLD/ccTLD layout.
    Generic,
    /// EURid layout: `Section:` headers followed by indented content.
    Sectioned,
}

impl Dialect {
    pub fn for_domain(domain: &str) -> Self {
        if domain.to_lowercase().ends_with(".eu") {
            Dialect::Sectioned
        } else {
            Dialect::Generic
        }
    }

    /// Parse every field except the IP addresses.
    pub fn parse_fields(self, whois_text: &str, domain: &str) -> WhoisRecord {
        match self {
            Dialect::Generic => whois_text
                .lines()
                .fold(GenericScan::default(), GenericScan::feed)
                .finish(domain, whois_text),
            Dialect::Sectioned => whois_text
                .lines()
                .fold(SectionedScan::default(), SectionedScan::feed)
                .finish(domain, whois_text),
        }
    }
}

/// Best-effort WHOIS parsing. Unrecognized lines are skipped; parsing never fails.
pub struct WhoisParser {
    extractor: IpExtractor,
}

impl WhoisParser {
    pub fn new(extractor: IpExtractor) -> Self {
        Self { extractor }
    }

    pub async fn parse(&self, whois_text: &str, domain: &str) -> WhoisRecord {
        let dialect = Dialect::for_domain(domain);
        debug!("Parsing {} bytes of WHOIS for {} as {:?}", whois_text.len(), domain, dialect);

        let fields = dialect.parse_fields(whois_text, domain);
        let ip_addresses = self.extractor.extract(whois_text, domain).await;

        WhoisRecord { ip_addresses, ..fields }
    }
}

/// Split on the first colon; both sides trimmed, both must be non-empty.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

#[derive(Default)]
struct GenericScan {
    registrar: String,
    creation_date: String,
    expiration_date: String,
    last_updated: String,
    status: Vec<String>,
    nameservers: Vec<String>,
}

impl GenericScan {
    // Rule order matters: a line sets at most one field, and later lines
    // overwrite earlier ones for single-valued fields.
    fn feed(mut self, line: &str) -> Self {
        let Some((key, value)) = split_key_value(line) else {
            return self;
        };
        let key = key.to_lowercase();

        if key.contains("registrar") {
            self.registrar = value.to_string();
        } else if key.contains("creation") || key.contains("created") || key.contains("registered") {
            self.creation_date = value.to_string();
        } else if key.contains("expir") {
            self.expiration_date = value.to_string();
        } else if key.contains("updated") || key.contains("modified") {
            self.last_updated = value.to_string();
        } else if key.contains("status") {
            self.status.extend(
                value
                    .split([',', ';'])
                    .map(str::trim)
                    .map(String::from),
            );
        } else if key.contains("name server") || key.contains("nameserver") {
            let host = value
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .find(|token| !token.is_empty());
            if let Some(host) = host {
                if !self.nameservers.iter().any(|ns| ns == host) {
                    self.nameservers.push(host.to_string());
                }
            }
        }

        self
    }

    fn finish(self, domain: &str, raw: &str) -> WhoisRecord {
        WhoisRecord {
            registrar: self.registrar,
            creation_date: self.creation_date,
            expiration_date: self.expiration_date,
            last_updated: self.last_updated,
            status: self.status,
            nameservers: self.nameservers,
            ..WhoisRecord::empty(domain, raw)
        }
    }
}

#[derive(Default)]
struct SectionedScan {
    section: String,
    domain_name: Option<String>,
    registrar: String,
    nameservers: Vec<String>,
}

impl SectionedScan {
    fn feed(mut self, line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            return self;
        }

        if let Some(header) = trimmed.strip_suffix(':') {
            self.section = header.to_lowercase();
            return self;
        }

        if line.starts_with(SECTION_INDENT) {
            self.section_content(trimmed);
            return self;
        }

        if let Some(("Domain", value)) = split_key_value(trimmed) {
            self.domain_name = Some(value.to_string());
        }

        self
    }

    fn section_content(&mut self, content: &str) {
        let (key, value) = match content.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (content, ""),
        };

        match self.section.as_str() {
            "registrar" if key == "Name" => self.registrar = value.to_string(),
            "name servers" if !content.contains(':') && content != EURID_BOILERPLATE => {
                self.nameservers.push(content.to_string());
            }
            "technical" if key == "Organisation" && self.registrar.is_empty() => {
                self.registrar = value.to_string();
            }
            _ => {}
        }
    }

    fn finish(self, domain: &str, raw: &str) -> WhoisRecord {
        WhoisRecord {
            domain_name: self.domain_name.unwrap_or_else(|| domain.to_string()),
            registrar: self.registrar,
            status: vec!["registered".to_string()],
            nameservers: self.nameservers,
            ..WhoisRecord::empty(domain, raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::LookupError,
        extractor::{AddressResolver, UnavailableResolver},
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    const VERISIGN_SAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Registrar URL: http://res-dom.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2024-10-19T10:00:00Z <<<
";

    const EURID_SAMPLE: &str = "\
% The WHOIS service offered by EURid and the access to the records
% in the EURid WHOIS database are provided for information purposes only.

Domain: example.eu
Script: LATIN

Registrant:
        NOT DISCLOSED!
        Visit www.eurid.eu for the web-based WHOIS.

Technical:
        Organisation: Example Tech Ltd
        Language: en
        Email: tech@example.eu

Registrar:
        Name: Example Registrar SA
        Website: https://registrar.example

Name servers:
        ns1.example.eu
        ns2.example.eu
        Please visit www.eurid.eu for more info.

Keys:
        flags:KSK protocol:3 algorithm:ECDSAP256SHA256 pubKey:abc

Please visit www.eurid.eu for more info.
";

    struct StaticResolver;

    #[async_trait]
    impl AddressResolver for StaticResolver {
        async fn resolve_a(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
            Ok(vec!["93.184.215.14".to_string()])
        }

        async fn resolve_aaaa(&self, _domain: &str) -> Result<Vec<String>, LookupError> {
            Ok(vec!["2606:2800:21f:cb07:6820:80da:af6b:8b2c".to_string()])
        }
    }

    fn parser(resolver: Arc<dyn AddressResolver>) -> WhoisParser {
        WhoisParser::new(IpExtractor::new(resolver))
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(Dialect::for_domain("example.eu"), Dialect::Sectioned);
        assert_eq!(Dialect::for_domain("EXAMPLE.EU"), Dialect::Sectioned);
        assert_eq!(Dialect::for_domain("example.com"), Dialect::Generic);
        assert_eq!(Dialect::for_domain("europe.com"), Dialect::Generic);
        assert_eq!(Dialect::for_domain("example.eus"), Dialect::Generic);
    }

    #[test]
    fn test_generic_verisign_layout() {
        let record = Dialect::Generic.parse_fields(VERISIGN_SAMPLE, "example.com");

        assert_eq!(record.domain_name, "example.com");
        assert_eq!(record.registrar, "RESERVED-Internet Assigned Numbers Authority");
        assert_eq!(record.creation_date, "1995-08-14T04:00:00Z");
        assert_eq!(record.expiration_date, "2025-08-13T04:00:00Z");
        assert_eq!(record.last_updated, "2024-08-14T07:01:34Z");
        assert_eq!(
            record.status,
            vec![
                "clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited",
                "clientTransferProhibited https://icann.org/epp#clientTransferProhibited",
            ]
        );
        assert_eq!(record.nameservers, vec!["A.IANA-SERVERS.NET", "B.IANA-SERVERS.NET"]);
        assert_eq!(record.raw, VERISIGN_SAMPLE);
    }

    #[test]
    fn test_generic_registrar_and_status_split() {
        let text = "Registrar: Example Inc\nDomain Status: active, clientTransferProhibited";
        let record = Dialect::Generic.parse_fields(text, "example.com");

        assert_eq!(record.registrar, "Example Inc");
        assert_eq!(record.status, vec!["active", "clientTransferProhibited"]);
    }

    #[test]
    fn test_generic_status_accumulates_with_duplicates() {
        let text = "Status: ok; locked\nstatus: ok";
        let record = Dialect::Generic.parse_fields(text, "example.org");
        assert_eq!(record.status, vec!["ok", "locked", "ok"]);
    }

    #[test]
    fn test_generic_status_keeps_empty_fragments() {
        let record = Dialect::Generic.parse_fields("Domain Status: active,", "example.com");
        assert_eq!(record.status, vec!["active", ""]);

        let record = Dialect::Generic.parse_fields("Domain Status: active,,ok;", "example.com");
        assert_eq!(record.status, vec!["active", "", "ok", ""]);
    }

    #[test]
    fn test_generic_registrar_last_matching_line_wins() {
        let text = "Registrar: Example Inc\nRegistrar IANA ID: 376";
        let record = Dialect::Generic.parse_fields(text, "example.com");
        assert_eq!(record.registrar, "376");
    }

    #[test]
    fn test_generic_first_matching_rule_wins_per_line() {
        // "registrar" is checked before "expir", so this line never reaches
        // the expiration rule.
        let text = "Registrar Registration Expiration Date: 2030-01-01";
        let record = Dialect::Generic.parse_fields(text, "example.com");

        assert_eq!(record.registrar, "2030-01-01");
        assert!(record.expiration_date.is_empty());
    }

    #[test]
    fn test_generic_date_keys() {
        let text = "Registered on: 01-Jan-2001\nExpires: 2031-01-01\nLast Modified: 2024-05-05";
        let record = Dialect::Generic.parse_fields(text, "example.uk");

        assert_eq!(record.creation_date, "01-Jan-2001");
        assert_eq!(record.expiration_date, "2031-01-01");
        assert_eq!(record.last_updated, "2024-05-05");
    }

    #[test]
    fn test_generic_value_keeps_inner_colons() {
        let text = "Updated Date: 2024-08-14T07:01:34Z";
        let record = Dialect::Generic.parse_fields(text, "example.com");
        assert_eq!(record.last_updated, "2024-08-14T07:01:34Z");
    }

    #[test]
    fn test_generic_nameservers_dedup_and_first_token() {
        let text = "\
Name Server: ns1.example.com
nameserver: ns1.example.com 192.0.2.53
Name Server: ns2.example.com,ns3.example.com
Name Server: NS1.EXAMPLE.COM";
        let record = Dialect::Generic.parse_fields(text, "example.com");

        assert_eq!(
            record.nameservers,
            vec!["ns1.example.com", "ns2.example.com", "NS1.EXAMPLE.COM"]
        );
    }

    #[test]
    fn test_generic_skips_empty_keys_and_values() {
        let text = ": orphan value\nRegistrar:\nRegistrar:    \nno colon here";
        let record = Dialect::Generic.parse_fields(text, "example.com");

        assert!(record.registrar.is_empty());
        assert!(record.status.is_empty());
    }

    #[test]
    fn test_generic_has_no_default_status() {
        let record = Dialect::Generic.parse_fields("Registrar: Example Inc", "example.com");
        assert!(record.status.is_empty());
    }

    #[test]
    fn test_sectioned_eurid_layout() {
        let record = Dialect::Sectioned.parse_fields(EURID_SAMPLE, "EXAMPLE.eu");

        assert_eq!(record.domain_name, "example.eu");
        assert_eq!(record.registrar, "Example Registrar SA");
        assert_eq!(record.nameservers, vec!["ns1.example.eu", "ns2.example.eu"]);
        assert_eq!(record.status, vec!["registered"]);
        assert!(record.creation_date.is_empty());
    }

    #[test]
    fn test_sectioned_name_servers_section() {
        let text = "Name Servers:\n        ns1.example.eu\n        ns2.example.eu\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.nameservers, vec!["ns1.example.eu", "ns2.example.eu"]);
    }

    #[test]
    fn test_sectioned_name_servers_are_not_deduplicated() {
        let text = "Name servers:\n        ns1.example.eu\n        ns1.example.eu\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.nameservers, vec!["ns1.example.eu", "ns1.example.eu"]);
    }

    #[test]
    fn test_sectioned_skips_glue_lines_with_colons() {
        let text = "Name servers:\n        ns1.example.eu\n        ns1.example.eu (2001:db8::53)\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.nameservers, vec!["ns1.example.eu"]);
    }

    #[test]
    fn test_sectioned_technical_organisation_fallback() {
        let text = "Technical:\n        Organisation: Example Tech Ltd\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.registrar, "Example Tech Ltd");
    }

    #[test]
    fn test_sectioned_technical_does_not_override_registrar() {
        let text = "\
Registrar:
        Name: Example Registrar SA
Technical:
        Organisation: Example Tech Ltd
";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.registrar, "Example Registrar SA");
    }

    #[test]
    fn test_sectioned_shallow_indent_is_not_section_content() {
        let text = "Registrar:\n    Name: Too Shallow\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert!(record.registrar.is_empty());
    }

    #[test]
    fn test_sectioned_status_is_always_registered() {
        let text = "Domain: example.eu\nStatus: AVAILABLE\n";
        let record = Dialect::Sectioned.parse_fields(text, "example.eu");
        assert_eq!(record.status, vec!["registered"]);
    }

    #[test]
    fn test_sectioned_without_headers_degrades_to_defaults() {
        let record = Dialect::Sectioned.parse_fields("just some text\nmore text", "example.eu");

        assert_eq!(record.domain_name, "example.eu");
        assert!(record.registrar.is_empty());
        assert!(record.nameservers.is_empty());
        assert_eq!(record.status, vec!["registered"]);
    }

    #[tokio::test]
    async fn test_parse_populates_ip_addresses() {
        let record = parser(Arc::new(StaticResolver))
            .parse("Registrar: Example Inc\nHost IP Address: 192.0.2.10", "example.com")
            .await;

        assert_eq!(record.ip_addresses.v4, vec!["93.184.215.14", "192.0.2.10"]);
        assert_eq!(record.ip_addresses.v6, vec!["2606:2800:21f:cb07:6820:80da:af6b:8b2c"]);
    }

    #[tokio::test]
    async fn test_parse_never_fails_on_garbage() {
        let parser = parser(Arc::new(UnavailableResolver));
        let inputs = [
            String::new(),
            "\0\u{1}\u{fffd}\u{fffd}::::\n%%%\n        :\n:".to_string(),
            ":\n::\n:::\n        \n\t\t:\u{0}".to_string(),
            "é".repeat(10_000),
            String::from_utf8_lossy(&[0xff, 0xfe, 0x3a, 0x0a, 0x80, 0x20, 0x3a]).into_owned(),
        ];

        for input in &inputs {
            for domain in ["example.com", "example.eu"] {
                let record = parser.parse(input, domain).await;
                assert_eq!(&record.raw, input);
            }
        }
    }

    #[tokio::test]
    async fn test_parse_is_idempotent() {
        let parser = parser(Arc::new(StaticResolver));

        for (text, domain) in [(VERISIGN_SAMPLE, "example.com"), (EURID_SAMPLE, "example.eu")] {
            let first = parser.parse(text, domain).await;
            let second = parser.parse(text, domain).await;
            assert_eq!(first, second);
        }
    }
}
