// src/cert/verification.rs
use chrono::{DateTime, TimeZone, Utc};
use openssl::{hash::MessageDigest, x509::X509};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    path::{Path, PathBuf},
};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use super::ca::CaMaterial;
use crate::error::CertError;

#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub path: PathBuf,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
    pub fingerprint: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub signed_by_ca: bool,
}

/// Summarises an issued certificate and checks it against the CA.
pub fn inspect_certificate(path: &Path, ca: &CaMaterial) -> Result<CertificateInfo, CertError> {
    let pem = fs::read(path)?;
    let openssl_cert = X509::from_pem(&pem)?;
    let der = openssl_cert.to_der()?;

    let (_remainder, cert) = X509Certificate::from_der(&der)
        .map_err(|e| CertError::KeyParse(format!("{}: {}", path.display(), e)))?;

    let (dns_names, ip_addresses) = alt_names(&cert);
    let ca_key = ca.cert().public_key()?;
    let signed_by_ca = openssl_cert.verify(&ca_key)?;

    Ok(CertificateInfo {
        path: path.to_path_buf(),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: timestamp(cert.validity().not_before.timestamp())?,
        not_after: timestamp(cert.validity().not_after.timestamp())?,
        serial: hex::encode(cert.raw_serial()),
        fingerprint: hex::encode(openssl::hash::hash(MessageDigest::sha256(), &der)?),
        dns_names,
        ip_addresses,
        signed_by_ca,
    })
}

/// DNS and IP SANs of a PEM certificate, e.g. one fetched from the cluster.
pub fn subject_alt_names(pem: &[u8]) -> Result<(Vec<String>, Vec<IpAddr>), CertError> {
    let der = X509::from_pem(pem)
        .and_then(|cert| cert.to_der())
        .map_err(|e| CertError::KeyParse(format!("stored certificate: {}", e)))?;
    let (_remainder, cert) = X509Certificate::from_der(&der)
        .map_err(|e| CertError::KeyParse(format!("stored certificate: {}", e)))?;
    Ok(alt_names(&cert))
}

fn alt_names(cert: &X509Certificate<'_>) -> (Vec<String>, Vec<IpAddr>) {
    let mut dns = Vec::new();
    let mut ips = Vec::new();

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(d) => dns.push(d.to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        ips.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    (dns, ips)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, CertError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CertError::KeyParse(format!("invalid certificate timestamp {}", secs)))
}
