// src/cert/catalog.rs
use super::types::{CertificateRole, ExtendedKeyUsage, KeyUsage, RoleTemplate};
use crate::error::CertError;
use crate::types::{CertKind, DependencyScope, NodeType};

const SIGN_AND_ENCIPHER: &[KeyUsage] = &[KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment];
const SERVER: &[ExtendedKeyUsage] = &[ExtendedKeyUsage::ServerAuth];
const CLIENT: &[ExtendedKeyUsage] = &[ExtendedKeyUsage::ClientAuth];
const SERVER_AND_CLIENT: &[ExtendedKeyUsage] =
    &[ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth];

/// Every certificate role a cluster node may need, in issue order.
pub const CATALOG: &[RoleTemplate] = &[
    RoleTemplate {
        name: "kube-apiserver",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: Some("kubernetes"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER,
        service_ip_san: true,
    },
    RoleTemplate {
        name: "kube-apiserver-kubelet-client",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: Some("system:masters"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "kube-controller-manager",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: Some("system:kube-controller-manager"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER_AND_CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "kube-scheduler",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: Some("system:kube-scheduler"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER_AND_CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "etcd-server",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: None,
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER_AND_CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "etcd-peer",
        kind: CertKind::Internal,
        scope: DependencyScope::ControlPlaneOnly,
        organization: None,
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER_AND_CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "kubelet-client",
        kind: CertKind::Internal,
        scope: DependencyScope::WorkerOnly,
        organization: Some("system:nodes"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "kubelet-server",
        kind: CertKind::Internal,
        scope: DependencyScope::Both,
        organization: Some("system:nodes"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "kube-proxy",
        kind: CertKind::Internal,
        scope: DependencyScope::Both,
        organization: Some("system:node-proxier"),
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: CLIENT,
        service_ip_san: false,
    },
    RoleTemplate {
        name: "ingress-frontend",
        kind: CertKind::External,
        scope: DependencyScope::ControlPlaneOnly,
        organization: None,
        key_usage: SIGN_AND_ENCIPHER,
        extended_key_usage: SERVER,
        service_ip_san: false,
    },
];

/// Catalog roles needed on `node_type`, in declaration order.
pub fn eligible_roles(node_type: NodeType) -> Vec<CertificateRole> {
    CATALOG
        .iter()
        .filter(|template| template.scope.includes(node_type))
        .map(RoleTemplate::instantiate)
        .collect()
}

/// Narrows the eligible roles for a renewal.
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub kind: Option<CertKind>,
    pub names: Vec<String>,
}

impl RoleFilter {
    pub fn internal() -> Self {
        Self {
            kind: Some(CertKind::Internal),
            names: Vec::new(),
        }
    }

    /// Unknown role names are rejected so a typo never renews nothing silently.
    pub fn validate(&self) -> Result<(), CertError> {
        for name in &self.names {
            if !CATALOG.iter().any(|template| template.name == name) {
                return Err(CertError::Config(format!("unknown certificate role: {}", name)));
            }
        }
        Ok(())
    }

    pub fn matches(&self, role: &CertificateRole) -> bool {
        if let Some(kind) = self.kind {
            if role.kind() != kind {
                return false;
            }
        }
        self.names.is_empty() || self.names.iter().any(|name| name == role.name())
    }

    pub fn apply(&self, roles: Vec<CertificateRole>) -> Vec<CertificateRole> {
        roles.into_iter().filter(|role| self.matches(role)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names(roles: &[CertificateRole]) -> Vec<&'static str> {
        roles.iter().map(CertificateRole::name).collect()
    }

    #[test]
    fn intersection_is_exactly_the_shared_roles() {
        let worker: BTreeSet<_> = names(&eligible_roles(NodeType::Worker)).into_iter().collect();
        let control: BTreeSet<_> = names(&eligible_roles(NodeType::ControlPlane))
            .into_iter()
            .collect();
        let both: BTreeSet<_> = CATALOG
            .iter()
            .filter(|t| t.scope == DependencyScope::Both)
            .map(|t| t.name)
            .collect();
        let all: BTreeSet<_> = CATALOG.iter().map(|t| t.name).collect();

        assert_eq!(worker.intersection(&control).copied().collect::<BTreeSet<_>>(), both);
        assert_eq!(worker.union(&control).copied().collect::<BTreeSet<_>>(), all);
    }

    #[test]
    fn eligible_roles_keep_catalog_order() {
        let roles = eligible_roles(NodeType::Worker);
        assert_eq!(names(&roles), vec!["kubelet-client", "kubelet-server", "kube-proxy"]);

        let roles = eligible_roles(NodeType::ControlPlane);
        assert_eq!(roles.first().map(CertificateRole::name), Some("kube-apiserver"));
        assert_eq!(roles.last().map(CertificateRole::name), Some("ingress-frontend"));
        assert!(!names(&roles).contains(&"kubelet-client"));
    }

    #[test]
    fn role_names_are_unique() {
        let all: BTreeSet<_> = CATALOG.iter().map(|t| t.name).collect();
        assert_eq!(all.len(), CATALOG.len());
    }

    #[test]
    fn internal_filter_drops_external_roles() {
        let roles = RoleFilter::internal().apply(eligible_roles(NodeType::ControlPlane));
        assert!(roles.iter().all(|r| r.kind() == CertKind::Internal));
        assert!(!names(&roles).contains(&"ingress-frontend"));
    }

    #[test]
    fn name_filter_selects_subset_and_rejects_unknown() {
        let filter = RoleFilter {
            kind: None,
            names: vec!["etcd-peer".to_string(), "kube-proxy".to_string()],
        };
        filter.validate().unwrap();
        let roles = filter.apply(eligible_roles(NodeType::ControlPlane));
        assert_eq!(names(&roles), vec!["etcd-peer", "kube-proxy"]);

        let bad = RoleFilter {
            kind: None,
            names: vec!["etcd-client".to_string()],
        };
        assert!(matches!(bad.validate(), Err(CertError::Config(_))));
    }
}
