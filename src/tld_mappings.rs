use once_cell::sync::Lazy;
use std::collections::HashMap;

// Registry WHOIS servers for common TLDs. Anything else goes through IANA
// referral discovery.
pub static KNOWN_WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // gTLDs
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.nic.info"),
        ("io", "whois.nic.io"),
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("xyz", "whois.nic.xyz"),
        // European ccTLDs
        ("eu", "whois.eu"),
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("be", "whois.dns.be"),
        ("it", "whois.nic.it"),
        ("se", "whois.iis.se"),
        ("ch", "whois.nic.ch"),
        ("pl", "whois.dns.pl"),
        // Elsewhere
        ("us", "whois.nic.us"),
        ("ca", "whois.cira.ca"),
        ("au", "whois.auda.org.au"),
        ("jp", "whois.jprs.jp"),
        ("br", "whois.registro.br"),
    ])
});

/// Look up a public suffix, falling back to its last label (`co.uk` → `uk`).
pub fn known_server(suffix: &str) -> Option<&'static str> {
    let suffix = suffix.trim_matches('.').to_lowercase();
    KNOWN_WHOIS_SERVERS.get(suffix.as_str()).copied().or_else(|| {
        suffix
            .rsplit('.')
            .next()
            .and_then(|label| KNOWN_WHOIS_SERVERS.get(label).copied())
    })
}
