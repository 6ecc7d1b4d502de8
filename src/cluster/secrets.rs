// src/cluster/secrets.rs
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Command;

use crate::error::CertError;

pub const CERT_DATA_KEY: &str = "tls.crt";

/// Name of the secret holding a role's previously issued certificate.
pub fn secret_name(role: &str) -> String {
    format!("{}-tls", role)
}

/// Read-only view of certificate material stored in the cluster.
pub trait SecretStore {
    /// PEM certificate stored for `role`, or `None` when the secret does not exist.
    fn issued_certificate(&self, namespace: &str, role: &str) -> Result<Option<Vec<u8>>, CertError>;
}

/// Reads secrets with `kubectl get secret`.
pub struct KubectlSecretStore {
    kubectl: String,
    kubeconfig: Option<String>,
}

impl KubectlSecretStore {
    pub fn new(kubeconfig: Option<String>) -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            kubeconfig,
        }
    }
}

#[derive(Deserialize)]
struct Secret {
    #[serde(default)]
    data: HashMap<String, String>,
}

impl SecretStore for KubectlSecretStore {
    fn issued_certificate(&self, namespace: &str, role: &str) -> Result<Option<Vec<u8>>, CertError> {
        let name = secret_name(role);
        let mut cmd = Command::new(&self.kubectl);
        cmd.args(["get", "secret", &name, "-n", namespace, "-o", "json"]);
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg(format!("--kubeconfig={}", kubeconfig));
        }

        tracing::debug!("executing: {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|e| CertError::SecretStore(format!("failed to run {}: {}", self.kubectl, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("NotFound") || stderr.contains("not found") {
                return Ok(None);
            }
            return Err(CertError::SecretStore(format!(
                "kubectl get secret {}: {}",
                name,
                stderr.trim()
            )));
        }

        decode_secret(&output.stdout)
    }
}

/// Extracts the base64 certificate entry from a secret's JSON.
pub fn decode_secret(json: &[u8]) -> Result<Option<Vec<u8>>, CertError> {
    let secret: Secret = serde_json::from_slice(json)
        .map_err(|e| CertError::SecretStore(format!("malformed secret: {}", e)))?;

    match secret.data.get(CERT_DATA_KEY) {
        Some(encoded) => general_purpose::STANDARD
            .decode(encoded.trim())
            .map(Some)
            .map_err(|e| CertError::SecretStore(format!("{} is not base64: {}", CERT_DATA_KEY, e))),
        None => Ok(None),
    }
}
