//! Environment-driven gateway configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Network flavor of the device-facing listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Plain CoAP over TCP.
    Tcp,
    /// CoAP over TLS over TCP, mutual authentication required.
    TcpTls,
    /// CoAP over UDP.
    Udp,
}

impl Network {
    /// Whether this network needs the TLS configuration block.
    pub fn requires_tls(&self) -> bool {
        matches!(self, Network::TcpTls)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tcp" => Ok(Network::Tcp),
            "tcp-tls" => Ok(Network::TcpTls),
            "udp" => Ok(Network::Udp),
            other => Err(format!("unsupported network type {other}")),
        }
    }
}

/// Back-end URL scheme. Anything but `http`/`https` is a startup error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTPS.
    Https,
}

impl Protocol {
    /// URL scheme string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported protocol type {other}")),
        }
    }
}

/// Liveness probing parameters.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Idle duration between two probes.
    pub time: Duration,
    /// Delay between retransmissions and the per-probe timeout.
    pub interval: Duration,
    /// Retransmissions carried out before declaring the peer gone.
    pub retry: u32,
}

/// Paths of the TLS material; required only for TLS networks.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    /// Server certificate chain, PEM.
    pub certificate: String,
    /// Server private key, PEM.
    pub certificate_key: String,
    /// Directory of CA certificates, one PEM per file.
    pub ca_pool: String,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address.
    pub addr: String,
    /// Listener network flavor.
    pub network: Network,
    /// Authorization service host (`host` or `host:port`).
    pub auth_host: String,
    /// Authorization service scheme.
    pub auth_protocol: Protocol,
    /// Resource directory host.
    pub resource_host: String,
    /// Resource directory scheme.
    pub resource_protocol: Protocol,
    /// Liveness probing parameters.
    pub keepalive: KeepaliveConfig,
    /// TLS material, present iff the network requires it.
    pub tls: Option<TlsPaths>,
}

impl Config {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`; the seam tests use to avoid
    /// touching process-global environment state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup("ADDRESS").unwrap_or_else(|| "0.0.0.0:5684".to_string());
        let network = parse("NETWORK", &lookup, Network::Tcp)?;
        let auth_host = lookup("AUTH_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let auth_protocol = parse("AUTH_PROTOCOL", &lookup, Protocol::Http)?;
        let resource_host = lookup("RESOURCE_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let resource_protocol = parse("RESOURCE_PROTOCOL", &lookup, Protocol::Http)?;

        let keepalive = KeepaliveConfig {
            time: duration("KEEPALIVE_TIME", &lookup, Duration::from_secs(3600))?,
            interval: duration("KEEPALIVE_INTERVAL", &lookup, Duration::from_secs(5))?,
            retry: parse("KEEPALIVE_RETRY", &lookup, 5u32)?,
        };

        let tls = if network.requires_tls() {
            Some(TlsPaths {
                certificate: lookup("TLS_CERTIFICATE")
                    .ok_or(ConfigError::Missing("TLS_CERTIFICATE"))?,
                certificate_key: lookup("TLS_CERTIFICATE_KEY")
                    .ok_or(ConfigError::Missing("TLS_CERTIFICATE_KEY"))?,
                ca_pool: lookup("TLS_CA_POOL").ok_or(ConfigError::Missing("TLS_CA_POOL"))?,
            })
        } else {
            None
        };

        Ok(Self {
            addr,
            network,
            auth_host,
            auth_protocol,
            resource_host,
            resource_protocol,
            keepalive,
            tls,
        })
    }

    /// Authorization service URL for `path`.
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.auth_protocol.as_str(), self.auth_host, path)
    }

    /// Resource directory URL for `path`.
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}://{}{}",
            self.resource_protocol.as_str(),
            self.resource_host,
            path
        )
    }
}

fn parse<T>(
    name: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            name,
            value,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn duration(
    name: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        Some(value) => {
            let parsed = parse_duration(&value);
            parsed.ok_or(ConfigError::InvalidValue {
                name,
                value,
                reason: "expected a duration such as 3600, 3600s, 500ms, 5m or 1h".to_string(),
            })
        }
        None => Ok(default),
    }
}

/// Bare numbers are seconds; `ms`, `s`, `m`, and `h` suffixes are accepted.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, scale) = if let Some(rest) = value.strip_suffix("ms") {
        (rest, Duration::from_millis(1))
    } else if let Some(rest) = value.strip_suffix('s') {
        (rest, Duration::from_secs(1))
    } else if let Some(rest) = value.strip_suffix('m') {
        (rest, Duration::from_secs(60))
    } else if let Some(rest) = value.strip_suffix('h') {
        (rest, Duration::from_secs(3600))
    } else {
        (value, Duration::from_secs(1))
    };
    let count: u64 = digits.trim().parse().ok()?;
    Some(scale * count as u32)
}
