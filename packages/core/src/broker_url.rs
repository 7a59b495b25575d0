//! Broker connection strings of the form `scheme://host:port`.

use url::{Host, Url};

use crate::ConnectionError;

/// Parsed broker connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    pub scheme: String,
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl BrokerUrl {
    /// Parse `scheme://[user:pass@]host[:port][/path]`.
    ///
    /// A missing port falls back to the scheme's default (6379 for redis, 0 otherwise).
    pub fn parse(url: &str) -> Result<Self, ConnectionError> {
        let invalid = |reason: String| ConnectionError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        let scheme = parsed.scheme().to_string();

        let host = match parsed.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid("missing host".to_string())),
        };

        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| default_port(&scheme));

        Ok(Self { scheme, host, port })
    }
}

impl std::fmt::Display for BrokerUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "redis" | "rediss" => 6379,
        _ => 0,
    }
}
