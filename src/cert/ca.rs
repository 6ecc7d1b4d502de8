// src/cert/ca.rs
use openssl::{
    pkey::{PKey, Private},
    x509::{X509Ref, X509},
};
use std::{fs, path::Path};

use crate::error::CertError;

/// CA certificate and its private key, checked to belong together.
pub struct CaMaterial {
    cert: X509,
    key: PKey<Private>,
}

impl CaMaterial {
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, CertError> {
        let cert_bytes = read(cert_path, "CA certificate")?;
        let key_bytes = read(key_path, "CA key")?;

        let cert = parse_cert(&cert_bytes).map_err(|e| {
            CertError::KeyParse(format!("CA certificate {}: {}", cert_path.display(), e))
        })?;
        let key = parse_key(&key_bytes)
            .map_err(|e| CertError::KeyParse(format!("CA key {}: {}", key_path.display(), e)))?;

        let material = Self::from_parts(cert, key).map_err(|e| match e {
            CertError::KeyMismatch { .. } => CertError::KeyMismatch {
                cert: cert_path.display().to_string(),
                key: key_path.display().to_string(),
            },
            other => other,
        })?;

        tracing::debug!(
            "loaded CA {:?} from {}",
            material.subject(),
            cert_path.display()
        );
        Ok(material)
    }

    pub fn from_parts(cert: X509, key: PKey<Private>) -> Result<Self, CertError> {
        let public = cert
            .public_key()
            .map_err(|e| CertError::KeyParse(format!("CA certificate public key: {}", e)))?;
        if !public.public_eq(&key) {
            return Err(CertError::KeyMismatch {
                cert: "<memory>".to_string(),
                key: "<memory>".to_string(),
            });
        }
        Ok(Self { cert, key })
    }

    pub fn cert(&self) -> &X509Ref {
        &self.cert
    }

    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn subject(&self) -> String {
        self.cert
            .subject_name()
            .entries()
            .filter_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn read(path: &Path, what: &str) -> Result<Vec<u8>, CertError> {
    if path.as_os_str().is_empty() {
        return Err(CertError::Config(format!("{} path is not set", what)));
    }
    fs::read(path).map_err(|e| CertError::Config(format!("cannot read {} {}: {}", what, path.display(), e)))
}

fn parse_cert(bytes: &[u8]) -> Result<X509, openssl::error::ErrorStack> {
    if bytes.starts_with(b"-----BEGIN") {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    }
}

fn parse_key(bytes: &[u8]) -> Result<PKey<Private>, openssl::error::ErrorStack> {
    if bytes.starts_with(b"-----BEGIN") {
        PKey::private_key_from_pem(bytes)
    } else {
        PKey::private_key_from_der(bytes)
    }
}
