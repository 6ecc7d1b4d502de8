// src/error.rs
use std::{fmt, io};

use openssl::error::ErrorStack;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    /// Malformed or missing configuration (validity unit, CA paths, host).
    #[error("configuration error: {0}")]
    Config(String),

    /// CA certificate or key could not be decoded.
    #[error("failed to parse CA material: {0}")]
    KeyParse(String),

    #[error("CA key {key} does not match the public key of CA certificate {cert}")]
    KeyMismatch { cert: String, key: String },

    /// A single SAN override token was malformed. Logged, never fatal.
    #[error("invalid SAN override token: {0}")]
    SanParse(String),

    #[error("failed to generate certificate {role}: {reason}")]
    Generation { role: String, reason: String },

    #[error("secret store error: {0}")]
    SecretStore(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("{}", RoleFailures(.0))]
    Aggregate(Vec<RoleFailure>),
}

impl CertError {
    pub fn generation(role: &str, cause: impl fmt::Display) -> Self {
        CertError::Generation {
            role: role.to_string(),
            reason: cause.to_string(),
        }
    }
}

/// One role that could not be issued during a run.
#[derive(Debug)]
pub struct RoleFailure {
    pub role: String,
    pub error: CertError,
}

struct RoleFailures<'a>(&'a [RoleFailure]);

impl fmt::Display for RoleFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} certificate(s) failed:", self.0.len())?;
        for failure in self.0 {
            write!(f, " [{}: {}]", failure.role, failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_failed_role() {
        let err = CertError::Aggregate(vec![
            RoleFailure {
                role: "etcd-peer".to_string(),
                error: CertError::generation("etcd-peer", "disk full"),
            },
            RoleFailure {
                role: "kube-proxy".to_string(),
                error: CertError::Config("unknown unit".to_string()),
            },
        ]);

        let message = err.to_string();
        assert!(message.starts_with("2 certificate(s) failed:"));
        assert!(message.contains("[etcd-peer: failed to generate certificate etcd-peer: disk full]"));
        assert!(message.contains("[kube-proxy: configuration error: unknown unit]"));
    }
}
