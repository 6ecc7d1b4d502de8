// src/action/create.rs
use super::{Action, BaseAction};
use crate::cert::eligible_roles;
use crate::config::Configuration;
use crate::error::CertError;

/// Issues every certificate the configured node type needs.
pub struct Create {
    base: BaseAction,
}

impl Create {
    pub fn new(cfg: Configuration) -> Result<Self, CertError> {
        Ok(Self {
            base: BaseAction::new("create", cfg)?,
        })
    }
}

impl Action for Create {
    fn base(&self) -> &BaseAction {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseAction {
        &mut self.base
    }

    fn run(&mut self) -> Result<(), CertError> {
        tracing::debug!("***** {} Run *****", self.name().to_uppercase());
        let roles = eligible_roles(self.base.cfg.node_type);
        tracing::info!(
            "creating {} certificates for {} node",
            roles.len(),
            self.base.cfg.node_type
        );
        self.base.iterate(roles, &mut |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::execute;
    use crate::test_support::TestCa;
    use crate::types::NodeType;
    use std::fs;
    use tempfile::TempDir;
    use x509_parser::prelude::{FromDer, X509Certificate};

    fn configuration(dir: &TempDir, node_type: NodeType, host: &str) -> Configuration {
        let (ca_cert, ca_key) = TestCa::new("cluster-ca").write_to(&dir.path().join("ca"));
        Configuration {
            ca_cert,
            ca_key,
            host: Some(host.to_string()),
            output_dir: dir.path().join("out"),
            node_type,
            ..Configuration::default()
        }
    }

    fn listing(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn worker_gets_one_pair_per_eligible_role() {
        let dir = TempDir::new().unwrap();
        let cfg = configuration(&dir, NodeType::Worker, "10.0.0.7");
        let out = cfg.output_dir.clone();

        let mut action = Create::new(cfg).unwrap();
        execute(&mut action).unwrap();

        assert_eq!(
            listing(&out),
            vec![
                "kube-proxy.crt",
                "kube-proxy.key",
                "kubelet-client.crt",
                "kubelet-client.key",
                "kubelet-server.crt",
                "kubelet-server.key",
            ]
        );
        let order: Vec<_> = action.base().artifacts().iter().map(|a| a.role.as_str()).collect();
        assert_eq!(order, vec!["kubelet-client", "kubelet-server", "kube-proxy"]);
    }

    #[test]
    fn control_plane_end_to_end() {
        let dir = TempDir::new().unwrap();
        let mut cfg = configuration(&dir, NodeType::ControlPlane, "node1.cluster.local");
        cfg.cluster.virtual_ip = Some("10.0.0.1".to_string());
        cfg.validity = 30;
        cfg.unit = "d".to_string();
        let out = cfg.output_dir.clone();

        let mut action = Create::new(cfg).unwrap();
        execute(&mut action).unwrap();

        let pem = fs::read(out.join("kube-apiserver.crt")).unwrap();
        let der = openssl::x509::X509::from_pem(&pem).unwrap().to_der().unwrap();
        let (_, cert) = X509Certificate::from_der(&der).unwrap();

        let cn: Vec<_> = cert
            .subject()
            .iter_common_name()
            .filter_map(|attr| attr.as_str().ok())
            .collect();
        assert_eq!(cn, vec!["node1.cluster.local"]);

        let (dns, ips) = crate::cert::verification::subject_alt_names(&pem).unwrap();
        assert!(dns.contains(&"node1.cluster.local".to_string()));
        assert!(dns.contains(&"node1".to_string()));
        assert!(ips.contains(&"10.0.0.1".parse().unwrap()));

        let validity = cert.validity();
        assert_eq!(
            validity.not_after.timestamp() - validity.not_before.timestamp(),
            30 * 24 * 3600
        );
        assert_eq!(action.base().artifacts().len(), 9);
    }

    #[test]
    fn mismatched_ca_fails_before_writing() {
        let dir = TempDir::new().unwrap();
        let mut cfg = configuration(&dir, NodeType::ControlPlane, "10.0.0.5");
        let (_, foreign_key) = TestCa::new("other-ca").write_to(&dir.path().join("other"));
        cfg.ca_key = foreign_key;
        let out = cfg.output_dir.clone();

        let err = Create::new(cfg).err().unwrap();
        assert!(matches!(err, CertError::KeyMismatch { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn rerun_overwrites_instead_of_accumulating() {
        let dir = TempDir::new().unwrap();
        let cfg = configuration(&dir, NodeType::Worker, "worker1.example");
        let out = cfg.output_dir.clone();

        execute(&mut Create::new(cfg.clone()).unwrap()).unwrap();
        let first = fs::read(out.join("kube-proxy.crt")).unwrap();
        execute(&mut Create::new(cfg).unwrap()).unwrap();

        assert_eq!(listing(&out).len(), 6);
        assert_ne!(fs::read(out.join("kube-proxy.crt")).unwrap(), first);
    }
}
