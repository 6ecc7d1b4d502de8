// src/cert/san.rs
use std::net::IpAddr;

use crate::error::CertError;

const DNS_PREFIX: &str = "DNS:";
const IP_PREFIX: &str = "IP:";
const SERVICE_IP_PREFIX: &str = "K8SSVCIP:";

/// Extra subject alternative names supplied with `--server-cert-san`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanOverride {
    pub dns: Vec<String>,
    /// `None` marks an `IP:` token whose value did not parse.
    pub ips: Vec<Option<IpAddr>>,
    pub service_ip: Option<IpAddr>,
}

impl SanOverride {
    pub fn is_empty(&self) -> bool {
        self.dns.is_empty() && self.ips.is_empty() && self.service_ip.is_none()
    }

    pub fn valid_ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ips.iter().flatten().copied()
    }
}

/// Parses `DNS:a,IP:1.2.3.4,K8SSVCIP:10.96.0.1`. Tokens are independent:
/// a bad IP leaves a `None` in its slot and unknown prefixes are skipped.
/// A `DNS:` value that is an IP literal is kept as an IP; an empty one is dropped.
pub fn parse(san: &str) -> SanOverride {
    let mut parsed = SanOverride::default();
    if san.trim().is_empty() {
        return parsed;
    }

    for token in san.split(',').map(str::trim) {
        if let Some(name) = token.strip_prefix(DNS_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                tracing::warn!("{}", CertError::SanParse(format!("{} (empty name)", token)));
            } else if let Ok(ip) = name.parse::<IpAddr>() {
                tracing::warn!("{} is an IP address, adding it as an IP SAN", token);
                parsed.ips.push(Some(ip));
            } else {
                parsed.dns.push(name.to_string());
            }
        } else if let Some(value) = token.strip_prefix(IP_PREFIX) {
            parsed.ips.push(parse_ip(token, value));
        } else if let Some(value) = token.strip_prefix(SERVICE_IP_PREFIX) {
            parsed.service_ip = parse_ip(token, value);
        } else if !token.is_empty() {
            tracing::debug!("ignoring SAN override token without a known prefix: {}", token);
        }
    }

    parsed
}

fn parse_ip(token: &str, value: &str) -> Option<IpAddr> {
    match value.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(e) => {
            tracing::warn!("{}", CertError::SanParse(format!("{} ({})", token, e)));
            None
        }
    }
}
