// config/types.rs
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::CertError;
use crate::types::NodeType;

/// Cluster-wide addresses that end up in control-plane certificates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterAddresses {
    pub virtual_ip: Option<String>,
    pub load_balancer: Option<String>,
    pub kube_service_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// This process runs on the cluster's master node and can read its secrets.
    pub run_on_master: bool,
    pub namespace: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            run_on_master: false,
            namespace: "core".to_string(),
        }
    }
}

/// Everything an action needs, built once per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub host: Option<String>,
    pub server_cert_san: String,
    pub output_dir: PathBuf,
    pub validity: u32,
    pub unit: String,
    pub node_type: NodeType,
    pub cluster: ClusterAddresses,
    pub env: Environment,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            ca_cert: PathBuf::new(),
            ca_key: PathBuf::new(),
            host: None,
            server_cert_san: String::new(),
            output_dir: PathBuf::from("certs"),
            validity: 365,
            unit: "d".to_string(),
            node_type: NodeType::ControlPlane,
            cluster: ClusterAddresses::default(),
            env: Environment::default(),
        }
    }
}

impl Configuration {
    /// Reads a JSON file, or YAML when the extension says so.
    pub fn load_from_file(path: &Path) -> Result<Self, CertError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CertError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|e| CertError::Config(format!("invalid config file {}: {}", path.display(), e)))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), CertError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CertError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Expands `~` in every path field.
    pub fn expand_paths(&mut self) {
        self.ca_cert = expand(&self.ca_cert);
        self.ca_key = expand(&self.ca_key);
        self.output_dir = expand(&self.output_dir);
    }

    pub fn validate(&self) -> Result<(), CertError> {
        if self.ca_cert.as_os_str().is_empty() {
            return Err(CertError::Config("CA certificate path is required".to_string()));
        }
        if self.ca_key.as_os_str().is_empty() {
            return Err(CertError::Config("CA key path is required".to_string()));
        }
        if self.validity == 0 {
            return Err(CertError::Config("validity must be greater than zero".to_string()));
        }
        // Also enforces the upper bound on the lifetime.
        crate::cert::validity_duration(self.validity, &self.unit)?;
        Ok(())
    }

    pub fn debug(&self) {
        tracing::debug!("ca-cert: {}", self.ca_cert.display());
        tracing::debug!("ca-key: {}", self.ca_key.display());
        tracing::debug!("host: {}", self.host.as_deref().unwrap_or("<unset>"));
        tracing::debug!("server-cert-san: {}", self.server_cert_san);
        tracing::debug!("output-dir: {}", self.output_dir.display());
        tracing::debug!("validity: {}{}", self.validity, self.unit);
        tracing::debug!("node-type: {}", self.node_type);
        tracing::debug!("cluster: {:?}", self.cluster);
        tracing::debug!(
            "run-on-master: {}, namespace: {}",
            self.env.run_on_master,
            self.env.namespace
        );
    }
}

fn expand(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).to_string()),
        None => path.to_path_buf(),
    }
}
